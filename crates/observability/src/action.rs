use std::fmt::Display;

use tracing::{Span, info_span, span::EnteredSpan};

/// The logical operation a log line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Startup,
    DeployChequebook,
    PeerConnect,
    UpdateBalance,
    SendCheque,
    ReceiveCheque,
    ConfirmCheque,
    CashCheque,
}

/// Log context for the swap engine.
///
/// Every span carries the node's own address (`base`), the counterparty
/// (`peer`) when there is one, and the current [`Action`].
#[derive(Debug, Clone)]
pub struct SwapLogger {
    base: String,
    peer: Option<String>,
}

impl SwapLogger {
    pub fn new(base: impl Display) -> Self {
        Self {
            base: base.to_string(),
            peer: None,
        }
    }

    /// A logger for the same node scoped to `peer`.
    pub fn with_peer(&self, peer: impl Display) -> Self {
        Self {
            base: self.base.clone(),
            peer: Some(peer.to_string()),
        }
    }

    /// Span for `action`, to be used with `Instrument` across awaits.
    pub fn span(&self, action: Action) -> Span {
        let action: &'static str = action.into();
        info_span!(
            target: "swap",
            "swap",
            action,
            base = %self.base,
            peer = self.peer.as_deref(),
        )
    }

    /// Enter `action` until the returned guard is dropped.
    pub fn set_action(&self, action: Action) -> EnteredSpan {
        self.span(action).entered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture<F: FnOnce()>(f: F) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::SendCheque.to_string(), "send_cheque");
        assert_eq!(Action::DeployChequebook.to_string(), "deploy_chequebook");
    }

    #[test]
    fn test_set_action_tags_events() {
        let logger = SwapLogger::new("0xbase").with_peer("aabb");
        let out = capture(|| {
            let _guard = logger.set_action(Action::SendCheque);
            tracing::info!("cheque emitted");
        });

        assert!(out.contains("action=\"send_cheque\""), "{out}");
        assert!(out.contains("base=0xbase"), "{out}");
        assert!(out.contains("peer=\"aabb\""), "{out}");
        assert!(out.contains("cheque emitted"), "{out}");
    }

    #[test]
    fn test_action_is_scoped() {
        let logger = SwapLogger::new("0xbase");
        let out = capture(|| {
            {
                let _guard = logger.set_action(Action::CashCheque);
                tracing::info!("inside");
            }
            tracing::info!("outside");
        });

        let outside = out.lines().find(|l| l.contains("outside")).unwrap();
        assert!(!outside.contains("cash_cheque"), "{outside}");
        assert!(!out.contains("peer="), "{out}");
    }
}
