use ndn_core::Data;

use crate::face::{Face, FaceScope};

/// Whether an unsolicited Data packet may enter the content store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsolicitedDataDecision {
    Drop,
    Cache,
}

/// Admission policy for Data that matched no PIT entry
pub trait UnsolicitedDataPolicy {
    fn decide(&self, ingress: &dyn Face, data: &Data) -> UnsolicitedDataDecision;
}

/// Never cache unsolicited Data (the default)
pub struct DropAllPolicy;

impl UnsolicitedDataPolicy for DropAllPolicy {
    fn decide(&self, _ingress: &dyn Face, _data: &Data) -> UnsolicitedDataDecision {
        UnsolicitedDataDecision::Drop
    }
}

/// Cache unsolicited Data arriving from local applications
pub struct AdmitLocalPolicy;

impl UnsolicitedDataPolicy for AdmitLocalPolicy {
    fn decide(&self, ingress: &dyn Face, _data: &Data) -> UnsolicitedDataDecision {
        if ingress.scope() == FaceScope::Local {
            UnsolicitedDataDecision::Cache
        } else {
            UnsolicitedDataDecision::Drop
        }
    }
}

/// Cache every unsolicited Data
pub struct AdmitAllPolicy;

impl UnsolicitedDataPolicy for AdmitAllPolicy {
    fn decide(&self, _ingress: &dyn Face, _data: &Data) -> UnsolicitedDataDecision {
        UnsolicitedDataDecision::Cache
    }
}

/// Look up a policy by its configuration name
pub fn from_name(name: &str) -> Option<Box<dyn UnsolicitedDataPolicy>> {
    match name {
        "drop-all" => Some(Box::new(DropAllPolicy)),
        "admit-local" => Some(Box::new(AdmitLocalPolicy)),
        "admit-all" => Some(Box::new(AdmitAllPolicy)),
        _ => None,
    }
}
