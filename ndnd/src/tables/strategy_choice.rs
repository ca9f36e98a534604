use std::collections::HashMap;
use std::rc::Rc;

use log::debug;
use ndn_core::Name;

use crate::fw::strategy::Strategy;
use crate::tables::name_tree::NameTree;

/// Errors raised by strategy choice updates
#[derive(Debug, thiserror::Error)]
pub enum StrategyChoiceError {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(Name),
}

/// Maps name prefixes to forwarding strategies
///
/// Choices are anchored in the name tree; strategy instances are registered
/// here by their instance name. The effective strategy for a name is the
/// choice at its longest matching prefix, and the root `/` always resolves.
pub struct StrategyChoice {
    instances: HashMap<Name, Rc<dyn Strategy>>,
    default: Rc<dyn Strategy>,
}

impl StrategyChoice {
    /// Create the table with its initial default strategy
    pub fn new(default: Rc<dyn Strategy>) -> Self {
        let mut instances = HashMap::new();
        instances.insert(default.name().clone(), Rc::clone(&default));
        Self { instances, default }
    }

    /// Register a strategy instance under its own name
    pub fn register(&mut self, strategy: Rc<dyn Strategy>) {
        self.instances.insert(strategy.name().clone(), strategy);
    }

    /// Replace the default strategy (the choice at the root prefix)
    pub fn set_default(
        &mut self,
        name_tree: &mut NameTree,
        strategy_name: &Name,
    ) -> Result<(), StrategyChoiceError> {
        let instance = self
            .instances
            .get(strategy_name)
            .cloned()
            .ok_or_else(|| StrategyChoiceError::UnknownStrategy(strategy_name.clone()))?;
        self.default = instance;

        let root = name_tree.lookup(&Name::new());
        name_tree.entry_mut(root).strategy_choice = Some(strategy_name.clone());
        debug!("strategy choice default = {}", strategy_name);
        Ok(())
    }

    /// Choose a strategy for a prefix
    pub fn insert(
        &mut self,
        name_tree: &mut NameTree,
        prefix: &Name,
        strategy_name: &Name,
    ) -> Result<(), StrategyChoiceError> {
        if !self.instances.contains_key(strategy_name) {
            return Err(StrategyChoiceError::UnknownStrategy(strategy_name.clone()));
        }
        let nte = name_tree.lookup(prefix);
        name_tree.entry_mut(nte).strategy_choice = Some(strategy_name.clone());
        debug!("strategy choice {} = {}", prefix, strategy_name);
        Ok(())
    }

    /// Remove the choice at a prefix (the root choice cannot be removed)
    pub fn erase(&mut self, name_tree: &mut NameTree, prefix: &Name) {
        if prefix.is_empty() {
            return;
        }
        if let Some(nte) = name_tree.find(prefix) {
            name_tree.entry_mut(nte).strategy_choice = None;
            name_tree.cleanup_if_empty(nte);
        }
    }

    /// Resolve the effective strategy for `name` by longest-prefix match
    pub fn find_effective_strategy(&self, name_tree: &NameTree, name: &Name) -> Rc<dyn Strategy> {
        name_tree
            .find_longest_prefix_match(name, |entry| entry.strategy_choice.is_some())
            .and_then(|nte| name_tree.entry(nte).strategy_choice.as_ref())
            .and_then(|choice| self.instances.get(choice))
            .cloned()
            .unwrap_or_else(|| Rc::clone(&self.default))
    }
}
