#![allow(dead_code)]

/// Implement `Contextual` for a struct with a `base: HandlerBase` field.
#[allow(unused_macros)]
macro_rules! contextual {
    ($ty:ty) => {
        impl brrtflow::Contextual for $ty {
            fn base(&self) -> &brrtflow::HandlerBase {
                &self.base
            }
            fn base_mut(&mut self) -> &mut brrtflow::HandlerBase {
                &mut self.base
            }
        }
    };
}

pub mod log_capture {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory sink for formatted log lines.
    #[derive(Clone, Default)]
    pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        /// Captured lines parsed as JSON objects.
        pub fn events(&self) -> Vec<serde_json::Value> {
            self.contents()
                .lines()
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect()
        }
    }

    pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            CaptureWriter(Arc::clone(&self.0))
        }
    }

    /// Run `f` on the current thread with JSON logs captured.
    pub fn capture<T>(f: impl FnOnce() -> T) -> (T, LogCapture) {
        let sink = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(Level::DEBUG)
            .with_writer(sink.clone())
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, sink)
    }

    /// Install a capturing subscriber for the current thread until the guard drops.
    pub fn capture_default() -> (tracing::subscriber::DefaultGuard, LogCapture) {
        let sink = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(Level::DEBUG)
            .with_writer(sink.clone())
            .finish();
        (tracing::subscriber::set_default(subscriber), sink)
    }
}

pub mod test_runtime {
    use std::sync::Once;

    static MAY_INIT: Once = Once::new();

    /// Coroutine stacks large enough for backtrace capture.
    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x80000);
        });
    }
}

pub fn app_config() -> brrtflow::AppConfig {
    brrtflow::AppConfig::new("pet-store", "10.9.8.7")
}
