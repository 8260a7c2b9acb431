/// The agent's coarse lifecycle phase. Transitions are one-way:
/// `Initializing -> Running -> Draining -> Stopped`. There is no way back
/// to an earlier phase — a restart means constructing a new supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentLifecycleState {
    Initializing,
    Running,
    Draining,
    Stopped,
}

impl AgentLifecycleState {
    /// Whether `next` is a legal transition from `self`. Staying in place
    /// is not a transition — callers that only ever move forward don't need
    /// to special-case a same-state call.
    pub fn can_transition_to(self, next: AgentLifecycleState) -> bool {
        matches!(
            (self, next),
            (AgentLifecycleState::Initializing, AgentLifecycleState::Running)
                | (AgentLifecycleState::Running, AgentLifecycleState::Draining)
                | (AgentLifecycleState::Draining, AgentLifecycleState::Stopped)
        )
    }
}
