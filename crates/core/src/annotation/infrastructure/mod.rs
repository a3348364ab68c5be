pub mod cached_region_detector;
