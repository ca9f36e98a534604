use ndn_core::{Data, Interest, Nack, NackReason, Name};

use crate::face::FaceId;
use crate::fw::forwarder::Forwarder;
use crate::tables::fib::NextHop;
use crate::tables::pit::PitEntryId;

/// A forwarding strategy
///
/// Strategies are registered with the StrategyChoice table by instance name
/// and dispatched by longest-prefix match. A strategy reacts to pipeline
/// events through these callbacks and acts by calling the forwarder's
/// `send_interest` / `send_data*` / `send_nack*` / `set_expiry_timer` actions.
/// The only state a strategy may keep lives in the PIT entry scratch and the
/// measurements table.
pub trait Strategy {
    /// Instance name this strategy is registered under
    fn name(&self) -> &Name;

    /// An Interest missed the CS and needs upstream forwarding
    fn after_receive_interest(
        &self,
        fw: &mut Forwarder,
        interest: &Interest,
        ingress: FaceId,
        pit: PitEntryId,
    );

    /// An Interest was satisfied from the CS
    fn after_content_store_hit(
        &self,
        fw: &mut Forwarder,
        data: &Data,
        ingress: FaceId,
        pit: PitEntryId,
    ) {
        fw.send_data(pit, data, ingress);
    }

    /// A Data is about to satisfy this entry (multi-match path; the pipeline
    /// sends to the pending downstreams itself)
    fn before_satisfy_interest(
        &self,
        _fw: &mut Forwarder,
        _data: &Data,
        _ingress: FaceId,
        _pit: PitEntryId,
    ) {
    }

    /// A Data matched exactly this entry; default forwards it to every
    /// pending downstream
    fn after_receive_data(
        &self,
        fw: &mut Forwarder,
        data: &Data,
        ingress: FaceId,
        pit: PitEntryId,
    ) {
        self.before_satisfy_interest(fw, data, ingress, pit);
        fw.send_data_to_all(pit, ingress, data);
    }

    /// A Nack arrived on an out-record of this entry
    fn after_receive_nack(
        &self,
        _fw: &mut Forwarder,
        _nack: &Nack,
        _ingress: FaceId,
        _pit: PitEntryId,
    ) {
    }

    /// A looped Interest was detected on a point-to-point face; default
    /// answers with Nack~Duplicate
    fn on_interest_loop(&self, fw: &mut Forwarder, interest: &Interest, ingress: FaceId) {
        fw.send_nack_direct(ingress, interest.clone(), NackReason::Duplicate);
    }

    /// A face reported that it dropped an Interest this strategy sent
    fn on_dropped_interest(&self, _fw: &mut Forwarder, _interest: &Interest, _egress: FaceId) {}

    /// A new next hop appeared under a prefix covering this pending entry
    fn after_new_next_hop(&self, _fw: &mut Forwarder, _next_hop: &NextHop, _pit: PitEntryId) {}
}
