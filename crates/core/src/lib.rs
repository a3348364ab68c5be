pub mod shared {
    pub mod constants;
    pub mod decoded_image;
    pub mod region;
}

pub mod execution {
    pub mod executor;
    pub mod manual_queue;
    pub mod serial_queue;
}

pub mod capture {
    pub mod domain {
        pub mod authorization;
        pub mod capture_backend;
        pub mod capture_device;
        pub mod quality_preset;
        pub mod raw_frame_buffer;
    }
    pub mod capture_session;
    pub mod configuration_abort;
    pub mod device_selector;
    pub mod infrastructure;
    pub mod permission_gate;
    pub mod session_configurator;
}

pub mod frame {
    pub mod frame_converter;
    pub mod frame_dispatcher;
}

pub mod annotation {
    pub mod domain {
        pub mod annotation_transform;
        pub mod region_detector;
    }
    pub mod frame_annotator;
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod pipeline_config;
    pub mod pipeline_logger;
}
