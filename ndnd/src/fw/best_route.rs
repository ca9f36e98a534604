use std::time::{Duration, Instant};

use log::debug;
use ndn_core::{Interest, Nack, NackReason, Name};

use crate::face::{FaceId, LinkType};
use crate::fw::forwarder::Forwarder;
use crate::fw::strategy::Strategy;
use crate::tables::fib::{self, NextHop};
use crate::tables::pit::{has_pending_out_records, PitEntryId};

/// Best-route strategy: forward to the lowest-cost eligible next hop
///
/// An aggregated Interest whose entry already has a pending upstream is
/// suppressed. When a send is refused (e.g. hop limit exhausted towards a
/// non-local link) the next candidate is tried; with no route the downstream
/// gets Nack~NoRoute. A Nack from an upstream triggers one alternate next hop
/// before the consolidated reason is propagated downstream.
pub struct BestRouteStrategy {
    name: Name,
}

impl BestRouteStrategy {
    pub const STRATEGY_NAME: &'static str = "/localhost/nfd/strategy/best-route";

    pub fn new() -> Self {
        Self { name: Name::from_str(Self::STRATEGY_NAME) }
    }

    fn next_hops(fw: &Forwarder, name: &Name) -> Vec<NextHop> {
        fib::find_longest_prefix_match(fw.name_tree(), name)
            .and_then(|nte| fw.name_tree().entry(nte).fib.as_ref())
            .map(|entry| entry.next_hops().to_vec())
            .unwrap_or_default()
    }

    fn is_eligible(fw: &Forwarder, pit: PitEntryId, hop: FaceId, ingress: FaceId) -> bool {
        if hop == ingress {
            let ingress_is_ad_hoc =
                fw.face(ingress).map(|f| f.link_type()) == Some(LinkType::AdHoc);
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

impl Default for BestRouteStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for BestRouteStrategy {
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
        // an aggregated Interest with a live upstream needs no new forwarding
        if has_pending_out_records(fw.pit_entry(pit), Instant::now()) {
            debug!("best-route interest={} suppressed", interest.name);
            return;
        }

        for hop in Self::next_hops(fw, &interest.name) {
            if !Self::is_eligible(fw, pit, hop.face, ingress) {
                continue;
            }
            if fw.send_interest(pit, hop.face, interest) {
                return;
            }
        }

        debug!("best-route interest={} no-route", interest.name);
        fw.send_nack(pit, NackReason::NoRoute, ingress);
        fw.set_expiry_timer(pit, Duration::ZERO);
    }

    fn after_receive_nack(
        &self,
        fw: &mut Forwarder,
        nack: &Nack,
        ingress: FaceId,
        pit: PitEntryId,
    ) {
        let interest = fw.pit_entry(pit).interest.clone();

        // try an upstream that has not been used yet
        for hop in Self::next_hops(fw, &interest.name) {
            if fw.pit_entry(pit).find_out_record(hop.face).is_some() {
                continue;
            }
            if !Self::is_eligible(fw, pit, hop.face, ingress) {
                continue;
            }
            debug!("best-route nack={} retry out={}", interest.name, hop.face);
            if fw.send_interest(pit, hop.face, &interest) {
                // the pipeline zeroed the timer when the last upstream nacked;
                // give the retry until the downstreams lapse
                let now = Instant::now();
                if let Some(last) =
                    fw.pit_entry(pit).in_records.iter().map(|r| r.expiry).max()
                {
                    fw.set_expiry_timer(pit, last.saturating_duration_since(now));
                }
                return;
            }
        }

        // every upstream answered with a Nack: propagate the least severe
        let entry = fw.pit_entry(pit);
        if entry.out_records.iter().any(|r| r.incoming_nack.is_none()) {
            return;
        }
        let reason = entry
            .out_records
            .iter()
            .filter_map(|r| r.incoming_nack.as_ref())
            .fold(nack.reason, |acc, n| NackReason::less_severe(acc, n.reason));

        debug!("best-route nack={} propagate reason={}", interest.name, reason);
        fw.send_nacks(pit, reason);
        fw.set_expiry_timer(pit, Duration::ZERO);
    }
}
