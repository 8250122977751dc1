pub mod api;
pub mod core;

pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("tryon_lib"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // logging is routed through android_logger on device only;
        // host builds leave the `log` facade without a backend
    }
}
