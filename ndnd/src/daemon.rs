use std::time::Instant;

use anyhow::{bail, Result};
use log::info;
use ndn_core::{Data, Interest, Nack, Name};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::face::FaceId;
use crate::fw::forwarder::Forwarder;
use crate::fw::shortcut_opt::ShortcutOpt;
use crate::fw::unsolicited_data_policy;
use crate::scheduler::Scheduler;

/// A packet event marshaled onto the forwarder loop by a face
#[derive(Debug)]
pub enum FaceEvent {
    Interest { face: FaceId, interest: Interest },
    Data { face: FaceId, data: Data },
    Nack { face: FaceId, nack: Nack },
    DroppedInterest { face: FaceId, interest: Interest },
}

/// The forwarder event loop
///
/// Owns the forwarder and everything in it; faces deliver their I/O through
/// the event channel, so all table mutations and timer firings happen on this
/// one task.
pub struct Daemon {
    forwarder: Forwarder,
    rx: mpsc::UnboundedReceiver<FaceEvent>,
}

impl Daemon {
    /// Build the forwarder from the loaded configuration
    ///
    /// Returns the daemon and the sender faces use to marshal their events.
    pub fn new(config: &Config) -> Result<(Self, mpsc::UnboundedSender<FaceEvent>)> {
        let mut forwarder = Forwarder::new(config.forwarder_config(), Scheduler::new());

        let policy_name = config.tables.cs_unsolicited_policy.as_str();
        match unsolicited_data_policy::from_name(policy_name) {
            Some(policy) => forwarder.set_unsolicited_data_policy(policy),
            None => bail!("unknown cs_unsolicited_policy: {policy_name}"),
        }

        if let Some(section) = &config.shortcut_opt {
            forwarder.set_shortcut_opt(Some(ShortcutOpt::new(
                Name::from_str(&section.trigger_prefix),
                Name::from_str(&section.shortcut_name),
            )));
            info!("shortcut-opt enabled under {}", section.trigger_prefix);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        Ok((Self { forwarder, rx }, tx))
    }

    pub fn forwarder_mut(&mut self) -> &mut Forwarder {
        &mut self.forwarder
    }

    fn dispatch(&mut self, event: FaceEvent) {
        match event {
            FaceEvent::Interest { face, interest } => {
                self.forwarder.on_incoming_interest(interest, face)
            }
            FaceEvent::Data { face, data } => self.forwarder.on_incoming_data(data, face),
            FaceEvent::Nack { face, nack } => self.forwarder.on_incoming_nack(nack, face),
            FaceEvent::DroppedInterest { face, interest } => {
                self.forwarder.on_dropped_interest(interest, face)
            }
        }
    }

    /// Run until every event sender is gone
    pub async fn run(&mut self) {
        info!("Forwarder loop running");
        loop {
            self.forwarder.process_timers(Instant::now());
            let deadline = self.forwarder.next_timer_deadline();

            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
                _ = wait_until(deadline) => {}
            }
        }
        info!("Face event channel closed, stopping");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending::<()>().await,
    }
}
