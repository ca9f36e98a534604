use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use ndn_core::{Data, Interest, Nack, NackReason, Name};

use crate::face::{
    Face, FaceId, FaceScope, FaceTable, FaceTableError, LinkType, CONTENT_STORE_FACE_ID,
    INVALID_FACE_ID,
};
use crate::fw::shortcut_opt::ShortcutOpt;
use crate::fw::strategy::Strategy;
use crate::fw::unsolicited_data_policy::{
    DropAllPolicy, UnsolicitedDataDecision, UnsolicitedDataPolicy,
};
use crate::scheduler::{Event, Scheduler};
use crate::tables::cs::{ContentStore, DEFAULT_CS_CAPACITY};
use crate::tables::dead_nonce_list::{
    DeadNonceList, DEFAULT_DNL_CAPACITY, DEFAULT_DNL_LIFETIME,
};
use crate::tables::fib::{self, NextHop};
use crate::tables::measurements::{self, StrategyScratch};
use crate::tables::name_tree::NameTree;
use crate::tables::pit::{
    find_duplicate_nonce, has_pending_out_records, Pit, PitEntry, PitEntryId,
    DUPLICATE_NONCE_IN_SAME, DUPLICATE_NONCE_NONE,
};
use crate::tables::strategy_choice::{StrategyChoice, StrategyChoiceError};
use crate::tables::network_region::NetworkRegionTable;

/// Options of the `forwarder` configuration section plus table bounds
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Hop limit attached to Interests that carry none (0 = do not attach)
    pub default_hop_limit: u8,
    pub cs_capacity: usize,
    pub dnl_capacity: usize,
    pub dnl_lifetime: Duration,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            default_hop_limit: 0,
            cs_capacity: DEFAULT_CS_CAPACITY,
            dnl_capacity: DEFAULT_DNL_CAPACITY,
            dnl_lifetime: DEFAULT_DNL_LIFETIME,
        }
    }
}

/// Packet counters observable through management
#[derive(Debug, Clone, Default)]
pub struct ForwarderCounters {
    pub n_in_interests: u64,
    pub n_out_interests: u64,
    pub n_in_data: u64,
    pub n_out_data: u64,
    pub n_in_nacks: u64,
    pub n_out_nacks: u64,
    pub n_cs_hits: u64,
    pub n_cs_misses: u64,
    pub n_satisfied_interests: u64,
    pub n_unsatisfied_interests: u64,
    pub n_unsolicited_data: u64,
}

fn is_under_localhost(name: &Name) -> bool {
    name.get(0) == Some(&b"localhost"[..])
}

/// The forwarding pipeline and the tables it owns
///
/// Single-threaded: every entry point, strategy callback and timer firing runs
/// on the owning loop, so no internal locking exists. Faces marshal their I/O
/// onto that loop before calling in.
pub struct Forwarder {
    config: ForwarderConfig,
    scheduler: Scheduler,
    faces: FaceTable,
    name_tree: NameTree,
    pit: Pit,
    cs: ContentStore,
    dnl: DeadNonceList,
    strategy_choice: StrategyChoice,
    network_regions: NetworkRegionTable,
    unsolicited_data_policy: Box<dyn UnsolicitedDataPolicy>,
    shortcut_opt: Option<ShortcutOpt>,
    counters: ForwarderCounters,
}

impl Forwarder {
    /// Build a forwarder around the loop's scheduler
    ///
    /// The built-in strategies are registered and best-route becomes the
    /// default choice at the root prefix.
    pub fn new(config: ForwarderConfig, scheduler: Scheduler) -> Self {
        let best_route: Rc<dyn Strategy> = Rc::new(crate::fw::best_route::BestRouteStrategy::new());
        let default_name = best_route.name().clone();
        let mut strategy_choice = StrategyChoice::new(best_route);
        strategy_choice.register(Rc::new(crate::fw::multicast::MulticastStrategy::new()));

        let mut name_tree = NameTree::new();
        strategy_choice
            .set_default(&mut name_tree, &default_name)
            .expect("built-in default strategy is registered");

        let cs = ContentStore::new(config.cs_capacity);
        let dnl = DeadNonceList::new(config.dnl_capacity, config.dnl_lifetime);

        Self {
            config,
            scheduler,
            faces: FaceTable::new(),
            name_tree,
            pit: Pit::new(),
            cs,
            dnl,
            strategy_choice,
            network_regions: NetworkRegionTable::new(),
            unsolicited_data_policy: Box::new(DropAllPolicy),
            shortcut_opt: None,
            counters: ForwarderCounters::default(),
        }
    }

    // --- accessors -------------------------------------------------------

    pub fn counters(&self) -> &ForwarderCounters {
        &self.counters
    }

    pub fn name_tree(&self) -> &NameTree {
        &self.name_tree
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn pit_entry(&self, id: PitEntryId) -> &PitEntry {
        self.pit.get(id)
    }

    pub fn pit_entry_mut(&mut self, id: PitEntryId) -> &mut PitEntry {
        self.pit.get_mut(id)
    }

    pub fn cs(&self) -> &ContentStore {
        &self.cs
    }

    pub fn cs_mut(&mut self) -> &mut ContentStore {
        &mut self.cs
    }

    pub fn dnl_mut(&mut self) -> &mut DeadNonceList {
        &mut self.dnl
    }

    pub fn face(&self, id: FaceId) -> Option<&dyn Face> {
        self.faces.get(id)
    }

    pub fn network_regions_mut(&mut self) -> &mut NetworkRegionTable {
        &mut self.network_regions
    }

    /// Per-name scratch for strategies
    pub fn measurements_scratch(&mut self, name: &Name) -> &mut StrategyScratch {
        let nte = measurements::get_or_create(&mut self.name_tree, name);
        &mut self
            .name_tree
            .entry_mut(nte)
            .measurements
            .as_mut()
            .expect("measurements entry just created")
            .scratch
    }

    pub fn register_strategy(&mut self, strategy: Rc<dyn Strategy>) {
        self.strategy_choice.register(strategy);
    }

    pub fn set_strategy_choice(
        &mut self,
        prefix: &Name,
        strategy_name: &Name,
    ) -> Result<(), StrategyChoiceError> {
        self.strategy_choice.insert(&mut self.name_tree, prefix, strategy_name)
    }

    pub fn set_default_strategy(&mut self, strategy_name: &Name) -> Result<(), StrategyChoiceError> {
        self.strategy_choice.set_default(&mut self.name_tree, strategy_name)
    }

    pub fn set_unsolicited_data_policy(&mut self, policy: Box<dyn UnsolicitedDataPolicy>) {
        self.unsolicited_data_policy = policy;
    }

    pub fn set_shortcut_opt(&mut self, shortcut_opt: Option<ShortcutOpt>) {
        self.shortcut_opt = shortcut_opt;
    }

    fn face_props(&self, id: FaceId) -> Option<(FaceScope, LinkType)> {
        self.faces.get(id).map(|f| (f.scope(), f.link_type()))
    }

    fn effective_strategy(&self, name: &Name) -> Rc<dyn Strategy> {
        self.strategy_choice.find_effective_strategy(&self.name_tree, name)
    }

    // --- face lifecycle --------------------------------------------------

    pub fn add_face(&mut self, face: Box<dyn Face>) -> Result<FaceId, FaceTableError> {
        self.faces.add(face)
    }

    /// Detach a face after scrubbing every table reference to it
    pub fn remove_face(&mut self, id: FaceId) {
        self.cleanup_on_face_removal(id);
        self.faces.remove(id);
    }

    fn cleanup_on_face_removal(&mut self, face: FaceId) {
        fib::remove_face(&mut self.name_tree, face);
        for (_, entry) in self.pit.iter_mut() {
            entry.delete_in_record(face);
            entry.delete_out_record(face);
        }
    }

    // --- FIB updates -----------------------------------------------------

    /// Insert or update a next hop; a genuinely new hop triggers the
    /// new-next-hop pipeline
    pub fn add_next_hop(&mut self, prefix: &Name, face: FaceId, cost: u64) {
        let is_new = fib::add_or_update_next_hop(&mut self.name_tree, prefix, face, cost);
        if is_new {
            self.on_new_next_hop(prefix, NextHop { face, cost });
        }
    }

    pub fn remove_next_hop(&mut self, prefix: &Name, face: FaceId) {
        fib::remove_next_hop(&mut self.name_tree, prefix, face);
    }

    // --- timers ----------------------------------------------------------

    /// Run every timer whose deadline is at or before `now`
    pub fn process_timers(&mut self, now: Instant) {
        while let Some(event) = self.scheduler.pop_due(now) {
            match event {
                Event::PitExpiry(pit) => self.on_interest_finalize(pit),
            }
        }
    }

    pub fn next_timer_deadline(&mut self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Re-arm the entry's expiry timer; zero means "next loop tick"
    pub fn set_expiry_timer(&mut self, pit: PitEntryId, duration: Duration) {
        if let Some(handle) = self.pit.get_mut(pit).expiry_timer.take() {
            self.scheduler.cancel(handle);
        }
        let handle = self.scheduler.schedule(Instant::now() + duration, Event::PitExpiry(pit));
        self.pit.get_mut(pit).expiry_timer = Some(handle);
    }

    // --- Interest pipelines ----------------------------------------------

    pub fn on_incoming_interest(&mut self, mut interest: Interest, ingress: FaceId) {
        let Some((ingress_scope, ingress_link)) = self.face_props(ingress) else {
            warn!("onIncomingInterest in=(invalid {}) interest={}", ingress, interest.name);
            return;
        };

        interest.tag.incoming_face_id = Some(ingress);
        self.counters.n_in_interests += 1;
        if let Some(face) = self.faces.get_mut(ingress) {
            face.counters_mut().packets_in += 1;
        }
        let nonce = interest.nonce_or_zero();
        debug!(
            "onIncomingInterest in={} interest={} nonce={:#x}",
            ingress, interest.name, nonce
        );

        // drop if hop limit zero, decrement otherwise (if present)
        if let Some(hop_limit) = interest.hop_limit {
            if hop_limit == 0 {
                if let Some(face) = self.faces.get_mut(ingress) {
                    face.counters_mut().n_in_hop_limit_zero += 1;
                }
                debug!("onIncomingInterest interest={} hop-limit=0 drop", interest.name);
                return;
            }
            interest.hop_limit = Some(hop_limit - 1);
        }

        // /localhost scope control
        if ingress_scope == FaceScope::NonLocal && is_under_localhost(&interest.name) {
            debug!("onIncomingInterest interest={} violates /localhost", interest.name);
            return;
        }

        let now = Instant::now();

        // detect duplicate nonce with the Dead Nonce List
        if self.dnl.has(&interest.name, nonce, now) {
            self.on_interest_loop(interest, ingress);
            return;
        }

        // strip forwarding hint once the Interest reaches the producer region
        if !interest.forwarding_hint.is_empty()
            && self.network_regions.is_in_producer_region(&interest.forwarding_hint)
        {
            debug!("onIncomingInterest interest={} reaching-producer-region", interest.name);
            interest.forwarding_hint.clear();
        }

        let (pit_id, _) = self.pit.insert(&mut self.name_tree, &interest);

        // detect duplicate nonce in the PIT entry
        let dnw = find_duplicate_nonce(self.pit.get(pit_id), nonce, ingress);
        let mut is_loop = dnw != DUPLICATE_NONCE_NONE;
        if ingress_link == LinkType::PointToPoint {
            // a retransmission on a point-to-point link is not a loop
            is_loop = is_loop && (dnw & !DUPLICATE_NONCE_IN_SAME) != DUPLICATE_NONCE_NONE;
        }
        if is_loop {
            self.on_interest_loop(interest, ingress);
            return;
        }

        // a fresh aggregation may still be answered from the cache
        if self.pit.get(pit_id).in_records.is_empty() {
            match self.cs.find(&interest, now) {
                Some(data) => self.on_content_store_hit(interest, ingress, pit_id, data),
                None => self.on_content_store_miss(interest, ingress, pit_id),
            }
        } else {
            self.on_content_store_miss(interest, ingress, pit_id);
        }
    }

    fn on_interest_loop(&mut self, interest: Interest, ingress: FaceId) {
        let Some((_, link)) = self.face_props(ingress) else {
            return;
        };
        if link != LinkType::PointToPoint {
            debug!(
                "onInterestLoop in={} interest={} nonce={:#x} drop",
                ingress,
                interest.name,
                interest.nonce_or_zero()
            );
            return;
        }
        debug!(
            "onInterestLoop in={} interest={} nonce={:#x}",
            ingress,
            interest.name,
            interest.nonce_or_zero()
        );
        let strategy = self.effective_strategy(&interest.name);
        strategy.on_interest_loop(self, &interest, ingress);
    }

    fn on_content_store_miss(&mut self, mut interest: Interest, ingress: FaceId, pit: PitEntryId) {
        debug!(
            "onContentStoreMiss interest={} nonce={:#x}",
            interest.name,
            interest.nonce_or_zero()
        );
        self.counters.n_cs_misses += 1;

        if let Some(shortcut) = self.shortcut_opt.clone() {
            shortcut.after_content_store_miss(self, &interest);
        }

        // attach the configured hop limit if the Interest carries none
        if self.config.default_hop_limit > 0 && interest.hop_limit.is_none() {
            interest.hop_limit = Some(self.config.default_hop_limit);
        }

        let now = Instant::now();
        let expiry = now + interest.lifetime();
        self.pit.get_mut(pit).insert_or_update_in_record(ingress, interest.clone(), expiry);

        // the entry expires when its last in-record does
        let last_expiry = self
            .pit
            .get(pit)
            .in_records
            .iter()
            .map(|r| r.expiry)
            .max()
            .unwrap_or(expiry);
        self.set_expiry_timer(pit, last_expiry.saturating_duration_since(now));

        // privileged local override bypasses the strategy
        if let Some(next_hop) = interest.tag.next_hop_face_id {
            if self.faces.contains(next_hop) {
                debug!(
                    "onContentStoreMiss interest={} nexthop-faceid={}",
                    interest.name, next_hop
                );
                self.on_outgoing_interest(&interest, next_hop, pit);
            }
            return;
        }

        let strategy = self.effective_strategy(&interest.name);
        strategy.after_receive_interest(self, &interest, ingress, pit);
    }

    fn on_content_store_hit(
        &mut self,
        interest: Interest,
        ingress: FaceId,
        pit: PitEntryId,
        mut data: Data,
    ) {
        debug!(
            "onContentStoreHit interest={} nonce={:#x}",
            interest.name,
            interest.nonce_or_zero()
        );
        self.counters.n_cs_hits += 1;

        data.tag.incoming_face_id = Some(CONTENT_STORE_FACE_ID);
        data.tag.pit_token = interest.tag.pit_token.clone();

        let freshness = data.freshness_period();
        {
            let entry = self.pit.get_mut(pit);
            entry.is_satisfied = true;
            entry.data_freshness_period = freshness;
        }
        self.set_expiry_timer(pit, Duration::ZERO);

        let strategy = self.effective_strategy(&interest.name);
        strategy.after_content_store_hit(self, &data, ingress, pit);
    }

    /// Forward an Interest upstream, recording the attempt on the PIT entry
    ///
    /// Returns false when the send is refused (unknown face, or hop limit
    /// exhausted towards a non-local link); no out-record is created then.
    pub fn on_outgoing_interest(
        &mut self,
        interest: &Interest,
        egress: FaceId,
        pit: PitEntryId,
    ) -> bool {
        let Some((egress_scope, _)) = self.face_props(egress) else {
            warn!("onOutgoingInterest out=(invalid {}) interest={}", egress, interest.name);
            return false;
        };

        if interest.hop_limit == Some(0) && egress_scope == FaceScope::NonLocal {
            if let Some(face) = self.faces.get_mut(egress) {
                face.counters_mut().n_out_hop_limit_zero += 1;
            }
            debug!(
                "onOutgoingInterest out={} interest={} non-local hop-limit=0",
                egress, interest.name
            );
            return false;
        }

        debug!(
            "onOutgoingInterest out={} interest={} nonce={:#x}",
            egress,
            interest.name,
            interest.nonce_or_zero()
        );

        let now = Instant::now();
        self.pit.get_mut(pit).insert_or_update_out_record(
            egress,
            interest.nonce_or_zero(),
            now,
            now + interest.lifetime(),
        );

        if let Some(face) = self.faces.get_mut(egress) {
            face.send_interest(interest);
            face.counters_mut().packets_out += 1;
        }
        self.counters.n_out_interests += 1;
        true
    }

    /// Retire a PIT entry: record its nonces in the DNL and erase it
    fn on_interest_finalize(&mut self, pit: PitEntryId) {
        if !self.pit.contains(pit) {
            return;
        }
        debug!(
            "onInterestFinalize interest={} {}",
            self.pit.get(pit).interest.name,
            if self.pit.get(pit).is_satisfied { "satisfied" } else { "unsatisfied" }
        );

        self.insert_dead_nonce_list(pit, None);

        if self.pit.get(pit).is_satisfied {
            self.counters.n_satisfied_interests += 1;
        } else {
            self.counters.n_unsatisfied_interests += 1;
        }

        if let Some(handle) = self.pit.get_mut(pit).expiry_timer.take() {
            self.scheduler.cancel(handle);
        }
        self.pit.erase(&mut self.name_tree, pit);
    }

    // --- Data pipelines --------------------------------------------------

    pub fn on_incoming_data(&mut self, mut data: Data, ingress: FaceId) {
        let Some((ingress_scope, ingress_link)) = self.face_props(ingress) else {
            warn!("onIncomingData in=(invalid {}) data={}", ingress, data.name);
            return;
        };

        data.tag.incoming_face_id = Some(ingress);
        self.counters.n_in_data += 1;
        if let Some(face) = self.faces.get_mut(ingress) {
            face.counters_mut().packets_in += 1;
        }
        debug!("onIncomingData in={} data={}", ingress, data.name);

        // /localhost scope control
        if ingress_scope == FaceScope::NonLocal && is_under_localhost(&data.name) {
            debug!("onIncomingData data={} violates /localhost", data.name);
            return;
        }

        let now = Instant::now();
        let matches = self.pit.find_all_data_matches(&self.name_tree, &data);
        if matches.is_empty() {
            self.on_data_unsolicited(data, ingress);
            return;
        }

        self.cs.insert(data.clone(), false, now);

        if matches.len() == 1 {
            let pit = matches[0];
            debug!("onIncomingData matching={}", self.pit.get(pit).interest.name);

            self.set_expiry_timer(pit, Duration::ZERO);

            let name = self.pit.get(pit).interest.name.clone();
            let strategy = self.effective_strategy(&name);
            strategy.after_receive_data(self, &data, ingress, pit);

            let freshness = data.freshness_period();
            {
                let entry = self.pit.get_mut(pit);
                entry.is_satisfied = true;
                entry.data_freshness_period = freshness;
            }
            self.insert_dead_nonce_list(pit, Some(ingress));
            self.pit.get_mut(pit).delete_out_record(ingress);
        } else {
            let mut pending_downstreams: BTreeSet<FaceId> = BTreeSet::new();
            let freshness = data.freshness_period();

            for &pit in &matches {
                debug!("onIncomingData matching={}", self.pit.get(pit).interest.name);

                for record in &self.pit.get(pit).in_records {
                    if record.expiry > now {
                        pending_downstreams.insert(record.face);
                    }
                }

                self.set_expiry_timer(pit, Duration::ZERO);

                let name = self.pit.get(pit).interest.name.clone();
                let strategy = self.effective_strategy(&name);
                strategy.before_satisfy_interest(self, &data, ingress, pit);

                {
                    let entry = self.pit.get_mut(pit);
                    entry.is_satisfied = true;
                    entry.data_freshness_period = freshness;
                }
                self.insert_dead_nonce_list(pit, Some(ingress));

                let entry = self.pit.get_mut(pit);
                entry.clear_in_records();
                entry.delete_out_record(ingress);
            }

            for downstream in pending_downstreams {
                if downstream == ingress && ingress_link != LinkType::AdHoc {
                    continue;
                }
                self.on_outgoing_data(&data, downstream);
            }
        }
    }

    fn on_data_unsolicited(&mut self, data: Data, ingress: FaceId) {
        self.counters.n_unsolicited_data += 1;

        let decision = match self.faces.get(ingress) {
            Some(face) => self.unsolicited_data_policy.decide(face, &data),
            None => UnsolicitedDataDecision::Drop,
        };
        debug!("onDataUnsolicited in={} data={} decision={:?}", ingress, data.name, decision);

        if decision == UnsolicitedDataDecision::Cache {
            self.cs.insert(data, true, Instant::now());
        }
    }

    /// Send a Data downstream, enforcing scope
    pub fn on_outgoing_data(&mut self, data: &Data, egress: FaceId) -> bool {
        if egress == INVALID_FACE_ID {
            warn!("onOutgoingData out=(invalid) data={}", data.name);
            return false;
        }
        let Some((egress_scope, _)) = self.face_props(egress) else {
            warn!("onOutgoingData out=(invalid {}) data={}", egress, data.name);
            return false;
        };

        if egress_scope == FaceScope::NonLocal && is_under_localhost(&data.name) {
            debug!("onOutgoingData out={} data={} violates /localhost", egress, data.name);
            return false;
        }

        debug!("onOutgoingData out={} data={}", egress, data.name);
        if let Some(face) = self.faces.get_mut(egress) {
            face.send_data(data);
            face.counters_mut().packets_out += 1;
        }
        self.counters.n_out_data += 1;
        true
    }

    // --- Nack pipelines --------------------------------------------------

    pub fn on_incoming_nack(&mut self, nack: Nack, ingress: FaceId) {
        let Some((_, ingress_link)) = self.face_props(ingress) else {
            return;
        };
        self.counters.n_in_nacks += 1;
        if let Some(face) = self.faces.get_mut(ingress) {
            face.counters_mut().packets_in += 1;
        }

        // Nacks only make sense on point-to-point links
        if ingress_link != LinkType::PointToPoint {
            debug!(
                "onIncomingNack in={} nack={}~{} link-type={:?}",
                ingress, nack.interest.name, nack.reason, ingress_link
            );
            return;
        }

        let Some(pit) = self.pit.find(&self.name_tree, &nack.interest) else {
            debug!(
                "onIncomingNack in={} nack={}~{} no-pit-entry",
                ingress, nack.interest.name, nack.reason
            );
            return;
        };

        let nonce = nack.interest.nonce_or_zero();
        {
            let entry = self.pit.get_mut(pit);
            let Some(out_record) = entry.find_out_record_mut(ingress) else {
                debug!(
                    "onIncomingNack in={} nack={}~{} no-out-record",
                    ingress, nack.interest.name, nack.reason
                );
                return;
            };
            if out_record.last_nonce != nonce {
                debug!(
                    "onIncomingNack in={} nack={}~{} nonce-mismatch {:#x}!={:#x}",
                    ingress, nack.interest.name, nack.reason, nonce, out_record.last_nonce
                );
                return;
            }
            out_record.incoming_nack = Some(nack.clone());
        }
        debug!("onIncomingNack in={} nack={}~{}", ingress, nack.interest.name, nack.reason);

        // expire the entry once every upstream has answered or lapsed
        if !has_pending_out_records(self.pit.get(pit), Instant::now()) {
            self.set_expiry_timer(pit, Duration::ZERO);
        }

        let name = self.pit.get(pit).interest.name.clone();
        let strategy = self.effective_strategy(&name);
        strategy.after_receive_nack(self, &nack, ingress, pit);
    }

    /// Nack a downstream, consuming its in-record
    pub fn on_outgoing_nack(
        &mut self,
        pit: PitEntryId,
        reason: NackReason,
        egress: FaceId,
    ) -> bool {
        let Some((_, egress_link)) = self.face_props(egress) else {
            warn!("onOutgoingNack out=(invalid {}) reason={}", egress, reason);
            return false;
        };

        let Some(in_record) = self.pit.get(pit).find_in_record(egress) else {
            debug!(
                "onOutgoingNack out={} nack={}~{} no-in-record",
                egress,
                self.pit.get(pit).interest.name,
                reason
            );
            return false;
        };

        if egress_link != LinkType::PointToPoint {
            debug!(
                "onOutgoingNack out={} nack={}~{} link-type={:?}",
                egress,
                self.pit.get(pit).interest.name,
                reason,
                egress_link
            );
            return false;
        }

        debug!("onOutgoingNack out={} nack={}~{}", egress, self.pit.get(pit).interest.name, reason);

        let nack = Nack::new(in_record.interest.clone(), reason);
        self.pit.get_mut(pit).delete_in_record(egress);

        if let Some(face) = self.faces.get_mut(egress) {
            face.send_nack(&nack);
            face.counters_mut().packets_out += 1;
        }
        self.counters.n_out_nacks += 1;
        true
    }

    /// Send a Nack outside any PIT entry (loop replies)
    pub fn send_nack_direct(&mut self, egress: FaceId, interest: Interest, reason: NackReason) {
        let Some((_, link)) = self.face_props(egress) else {
            return;
        };
        if link != LinkType::PointToPoint {
            return;
        }
        let nack = Nack::new(interest, reason);
        if let Some(face) = self.faces.get_mut(egress) {
            face.send_nack(&nack);
            face.counters_mut().packets_out += 1;
        }
        self.counters.n_out_nacks += 1;
    }

    /// A face reported dropping an Interest the forwarder had sent
    pub fn on_dropped_interest(&mut self, interest: Interest, egress: FaceId) {
        let strategy = self.effective_strategy(&interest.name);
        strategy.on_dropped_interest(self, &interest, egress);
    }

    // --- new next hop ----------------------------------------------------

    fn on_new_next_hop(&mut self, prefix: &Name, next_hop: NextHop) {
        let prefix_len = prefix.len();
        let affected = self.name_tree.partial_enumerate(prefix, |entry| {
            // a deeper FIB entry shadows the new next hop for its whole
            // subtree; the initial entry is always considered
            if entry.fib.is_some() && entry.name().len() > prefix_len {
                return (false, false);
            }
            (!entry.pit_entries.is_empty(), true)
        });

        let mut pits = Vec::new();
        for nte in affected {
            pits.extend(self.name_tree.entry(nte).pit_entries.iter().copied());
        }

        for pit in pits {
            if !self.pit.contains(pit) {
                continue;
            }
            let name = self.pit.get(pit).interest.name.clone();
            let strategy = self.effective_strategy(&name);
            strategy.after_new_next_hop(self, &next_hop, pit);
        }
    }

    // --- strategy actions ------------------------------------------------

    /// Strategy action: forward the Interest on `egress`
    pub fn send_interest(&mut self, pit: PitEntryId, egress: FaceId, interest: &Interest) -> bool {
        self.on_outgoing_interest(interest, egress, pit)
    }

    /// Strategy action: answer the downstream `egress` with `data`
    pub fn send_data(&mut self, pit: PitEntryId, data: &Data, egress: FaceId) -> bool {
        let token = self
            .pit
            .get(pit)
            .find_in_record(egress)
            .and_then(|r| r.interest.tag.pit_token.clone());
        self.pit.get_mut(pit).delete_in_record(egress);

        if token.is_some() {
            let mut data = data.clone();
            data.tag.pit_token = token;
            self.on_outgoing_data(&data, egress)
        } else {
            self.on_outgoing_data(data, egress)
        }
    }

    /// Strategy action: answer every pending downstream except the Data's
    /// origin (unless that face is ad hoc)
    pub fn send_data_to_all(&mut self, pit: PitEntryId, ingress: FaceId, data: &Data) {
        let now = Instant::now();
        let ingress_link = self.face_props(ingress).map(|(_, link)| link);
        let downstreams: Vec<FaceId> = self
            .pit
            .get(pit)
            .in_records
            .iter()
            .filter(|r| r.expiry > now)
            .filter(|r| r.face != ingress || ingress_link == Some(LinkType::AdHoc))
            .map(|r| r.face)
            .collect();

        for downstream in downstreams {
            self.send_data(pit, data, downstream);
        }
    }

    /// Strategy action: nack one downstream
    pub fn send_nack(&mut self, pit: PitEntryId, reason: NackReason, egress: FaceId) -> bool {
        self.on_outgoing_nack(pit, reason, egress)
    }

    /// Strategy action: nack every downstream
    pub fn send_nacks(&mut self, pit: PitEntryId, reason: NackReason) {
        let downstreams: Vec<FaceId> =
            self.pit.get(pit).in_records.iter().map(|r| r.face).collect();
        for downstream in downstreams {
            self.on_outgoing_nack(pit, reason, downstream);
        }
    }

    /// Send an Interest on a face without touching the PIT (shortcut-opt)
    pub fn send_interest_direct(&mut self, egress: FaceId, interest: &Interest) {
        if let Some(face) = self.faces.get_mut(egress) {
            face.send_interest(interest);
            face.counters_mut().packets_out += 1;
            self.counters.n_out_interests += 1;
        }
    }

    /// Local faces reachable as next hops of FIB entries under `prefix`
    pub fn local_fib_next_hop_faces(&self, prefix: &Name) -> Vec<FaceId> {
        let entries = self.name_tree.partial_enumerate(prefix, |e| (e.fib.is_some(), true));
        let mut faces = BTreeSet::new();
        for nte in entries {
            if let Some(fib) = self.name_tree.entry(nte).fib.as_ref() {
                for hop in fib.next_hops() {
                    if self.face_props(hop.face).map(|(scope, _)| scope) == Some(FaceScope::Local) {
                        faces.insert(hop.face);
                    }
                }
            }
        }
        faces.into_iter().collect()
    }

    // --- dead nonce list -------------------------------------------------

    /// Record the entry's outgoing nonces if the DNL needs them: always for an
    /// unsatisfied entry; for a satisfied one only when MustBeFresh was set
    /// and the Data's freshness is shorter than the DNL window
    fn insert_dead_nonce_list(&mut self, pit: PitEntryId, upstream: Option<FaceId>) {
        let entry = self.pit.get(pit);
        let need = if entry.is_satisfied {
            entry.interest.must_be_fresh && entry.data_freshness_period < self.dnl.lifetime()
        } else {
            true
        };
        if !need {
            return;
        }

        let name = entry.interest.name.clone();
        let nonces: Vec<u32> = match upstream {
            None => entry.out_records.iter().map(|r| r.last_nonce).collect(),
            Some(face) => {
                entry.find_out_record(face).map(|r| vec![r.last_nonce]).unwrap_or_default()
            }
        };

        let now = Instant::now();
        for nonce in nonces {
            self.dnl.add(&name, nonce, now);
        }
    }
}
