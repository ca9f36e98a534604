use std::time::{Duration, Instant};

use log::debug;
use ndn_core::{Interest, NackReason, Name};

use crate::face::{FaceId, LinkType};
use crate::fw::forwarder::Forwarder;
use crate::fw::strategy::Strategy;
use crate::tables::fib::{self, NextHop};
use crate::tables::pit::PitEntryId;

/// Multicast strategy: forward to every eligible next hop
pub struct MulticastStrategy {
    name: Name,
}

impl MulticastStrategy {
    pub const STRATEGY_NAME: &'static str = "/localhost/nfd/strategy/multicast";

    pub fn new() -> Self {
        Self { name: Name::from_str(Self::STRATEGY_NAME) }
    }

    fn is_eligible(fw: &Forwarder, pit: PitEntryId, hop: FaceId, ingress: Option<FaceId>) -> bool {
        if Some(hop) == ingress {
            let ingress_is_ad_hoc =
                ingress.and_then(|f| fw.face(f)).map(|f| f.link_type()) == Some(LinkType::AdHoc);
            if !ingress_is_ad_hoc {
                return false;
            }
        }
        let now = Instant::now();
        fw.pit_entry(pit)
            .find_out_record(hop)
            .map_or(true, |r| r.incoming_nack.is_some() || r.expiry <= now)
    }
}

impl Default for MulticastStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MulticastStrategy {
    fn name(&self) -> &Name {
        &self.name
    }

    fn after_receive_interest(
        &self,
        fw: &mut Forwarder,
        interest: &Interest,
        ingress: FaceId,
        pit: PitEntryId,
    ) {
        let hops = fib::find_longest_prefix_match(fw.name_tree(), &interest.name)
            .and_then(|nte| fw.name_tree().entry(nte).fib.as_ref())
            .map(|entry| entry.next_hops().to_vec())
            .unwrap_or_default();

        let mut sent = false;
        for hop in &hops {
            if !Self::is_eligible(fw, pit, hop.face, Some(ingress)) {
                continue;
            }
            sent |= fw.send_interest(pit, hop.face, interest);
        }

        if !sent && fw.pit_entry(pit).out_records.is_empty() {
            debug!("multicast interest={} no-route", interest.name);
            fw.send_nack(pit, NackReason::NoRoute, ingress);
            fw.set_expiry_timer(pit, Duration::ZERO);
        }
    }

    /// Forward a still-pending Interest towards a next hop that just appeared
    fn after_new_next_hop(&self, fw: &mut Forwarder, next_hop: &NextHop, pit: PitEntryId) {
        let now = Instant::now();
        let entry = fw.pit_entry(pit);
        if entry.is_satisfied || !entry.in_records.iter().any(|r| r.expiry > now) {
            return;
        }
        let interest = entry.interest.clone();
        if Self::is_eligible(fw, pit, next_hop.face, None) {
            debug!("multicast new-nexthop interest={} out={}", interest.name, next_hop.face);
            fw.send_interest(pit, next_hop.face, &interest);
        }
    }
}
