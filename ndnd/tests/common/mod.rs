use std::cell::RefCell;
use std::rc::Rc;

use ndn_core::{Data, Interest, Nack};
use ndnd::face::{Face, FaceCounters, FaceId, FaceScope, LinkType};

/// Everything a mock face transmitted, shared with the test body
#[derive(Default)]
pub struct SentPackets {
    pub interests: Vec<Interest>,
    pub data: Vec<Data>,
    pub nacks: Vec<Nack>,
}

/// Face stub that records outgoing packets
pub struct MockFace {
    id: FaceId,
    scope: FaceScope,
    link_type: LinkType,
    counters: FaceCounters,
    sent: Rc<RefCell<SentPackets>>,
}

impl MockFace {
    pub fn new(
        id: FaceId,
        scope: FaceScope,
        link_type: LinkType,
    ) -> (Box<MockFace>, Rc<RefCell<SentPackets>>) {
        let sent = Rc::new(RefCell::new(SentPackets::default()));
        let face = Box::new(MockFace {
            id,
            scope,
            link_type,
            counters: FaceCounters::default(),
            sent: Rc::clone(&sent),
        });
        (face, sent)
    }
}

impl Face for MockFace {
    fn id(&self) -> FaceId {
        self.id
    }

    fn scope(&self) -> FaceScope {
        self.scope
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn send_interest(&mut self, interest: &Interest) {
        self.sent.borrow_mut().interests.push(interest.clone());
    }

    fn send_data(&mut self, data: &Data) {
        self.sent.borrow_mut().data.push(data.clone());
    }

    fn send_nack(&mut self, nack: &Nack) {
        self.sent.borrow_mut().nacks.push(nack.clone());
    }

    fn counters(&self) -> &FaceCounters {
        &self.counters
    }

    fn counters_mut(&mut self) -> &mut FaceCounters {
        &mut self.counters
    }
}
