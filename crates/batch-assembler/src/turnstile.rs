//! Admits batch dispatches one at a time, in ticket order.

use tokio::sync::watch;

/// Ordered admission gate.
///
/// Tickets are issued by the caller (under its own lock) starting at 0. A
/// holder of ticket `n` enters only after tickets `0..n` have left.
pub(crate) struct Turnstile {
    serving: watch::Sender<u64>,
}

/// Held while a ticket is being served; leaving (dropping) admits the next.
pub(crate) struct Pass<'a> {
    turnstile: &'a Turnstile,
}

impl Turnstile {
    pub(crate) fn new() -> Self {
        let (serving, _) = watch::channel(0);
        Self { serving }
    }

    /// Wait until `ticket` is being served.
    pub(crate) async fn enter(&self, ticket: u64) -> Pass<'_> {
        let mut rx = self.serving.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|serving| *serving == ticket).await;
        Pass { turnstile: self }
    }

    /// Ticket currently being served.
    pub(crate) fn serving(&self) -> u64 {
        *self.serving.borrow()
    }
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        self.turnstile.serving.send_modify(|serving| *serving += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn admits_in_ticket_order() {
        let turnstile = Arc::new(Turnstile::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for ticket in [2u64, 0, 1] {
            let turnstile = turnstile.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _pass = turnstile.enter(ticket).await;
                order.lock().await.push(ticket);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2]);
        assert_eq!(turnstile.serving(), 3);
    }

    #[tokio::test]
    async fn dropping_pass_advances() {
        let turnstile = Turnstile::new();
        {
            let _pass = turnstile.enter(0).await;
            assert_eq!(turnstile.serving(), 0);
        }
        assert_eq!(turnstile.serving(), 1);
    }
}
