// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The trailer-message channel (§5, §9 design notes) realized as `tracing`
 * events. The reference pipeline serializes diagnostic writes from a
 * process-global channel; `tracing`'s dispatcher already serializes event
 * emission across threads, so no extra locking is needed here.
 */

/// Record a class-3 recoverable anomaly (§7): the step is downgraded rather
/// than aborted. Emits a `tracing::warn!` tagged with the step name.
pub fn warn_anomaly(step: &str, message: &str) {
    tracing::warn!(step, message, "recoverable anomaly, step downgraded");
}

/// Record that a step completed successfully.
pub fn note_complete(step: &str) {
    tracing::info!(step, "step complete");
}

/// Record that a step was skipped due to a dummy-pedigree reference
/// artifact.
pub fn note_skipped(step: &str, artifact: &str) {
    tracing::info!(step, artifact, "step skipped: dummy pedigree");
}

/// Record a fatal, run-aborting error immediately before it propagates out
/// of the step.
pub fn error_fatal(step: &str, message: &str, code: i32) {
    tracing::error!(step, message, code, "step failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct SharedBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for SharedBuf {
        type Writer = SharedBuf;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn warn_anomaly_emits_a_capturable_event() {
        let buf = SharedBuf(std::sync::Arc::new(std::sync::Mutex::new(Vec::new())));
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buf.clone())
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            warn_anomaly("blevcorr", "too few good pixels in row");
        });
        let captured = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(captured.contains("blevcorr"));
        assert!(captured.contains("too few good pixels"));
    }
}
