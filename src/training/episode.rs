use crate::ai::{Agent, Transition};
use crate::bridge::StepBridge;
use crate::error::BridgeError;
use crate::training::metrics::EpisodeResult;

/// Result of playing a single episode.
pub struct EpisodeTrace {
    pub transitions: Vec<Transition>,
    pub result: EpisodeResult,
}

/// Play one episode against the bridged simulation: reset, then
/// select/step until the simulation reports a terminal state or
/// `max_steps` transitions have been taken.
///
/// Any bridge error abandons the episode; the partial trace is dropped.
pub fn run_episode(
    bridge: &StepBridge,
    agent: &mut (impl Agent + ?Sized),
    training: bool,
    max_steps: Option<usize>,
) -> Result<EpisodeTrace, BridgeError> {
    let mut observation = bridge.reset()?;
    let mut transitions = Vec::new();
    let mut total_reward = 0.0f32;
    let mut truncated = false;

    while !observation.is_terminal() {
        if max_steps.is_some_and(|max| transitions.len() >= max) {
            truncated = true;
            break;
        }
        let action = agent.select_action(&observation, training);
        let next = bridge.step(action)?;
        let transition = Transition::new(observation, action, next.clone(), |pre, a, post| {
            bridge.reward(pre, a, post)
        });
        total_reward += transition.reward;
        transitions.push(transition);
        observation = next;
    }

    let terminal_reward = match transitions.last() {
        Some(t) if !truncated => t.reward,
        _ => 0.0,
    };
    let length = transitions.len();

    Ok(EpisodeTrace {
        transitions,
        result: EpisodeResult {
            terminal_reward,
            total_reward,
            length,
            truncated,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::RandomAgent;
    use crate::bridge::SimulationHost;
    use crate::sim::testing::{CountingSim, ParitySim};
    use crate::sim::Observation;

    /// Always plays the same action.
    struct Fixed(usize);

    impl Agent for Fixed {
        fn select_action(&mut self, _observation: &Observation, _training: bool) -> usize {
            self.0
        }

        fn name(&self) -> &str {
            "Fixed"
        }
    }

    #[test]
    fn test_episode_runs_to_terminal() {
        let (_host, bridge) = SimulationHost::spawn(CountingSim::new(3, Some(5)));
        let trace = run_episode(&bridge, &mut Fixed(2), true, None).unwrap();

        assert_eq!(trace.transitions.len(), 5);
        assert_eq!(trace.result.length, 5);
        assert!(!trace.result.truncated);
        assert!(trace.transitions.last().unwrap().done);
        assert!(trace.transitions[..4].iter().all(|t| !t.done));
        // CountingSim rewards the action index
        assert_eq!(trace.result.total_reward, 10.0);
        assert_eq!(trace.result.terminal_reward, 2.0);
    }

    #[test]
    fn test_transitions_chain_observations() {
        let (_host, bridge) = SimulationHost::spawn(CountingSim::new(2, Some(3)));
        let trace = run_episode(&bridge, &mut Fixed(1), true, None).unwrap();
        for pair in trace.transitions.windows(2) {
            assert!(pair[0].next_observation.same_snapshot(&pair[1].observation));
        }
    }

    #[test]
    fn test_max_steps_truncates() {
        let (_host, bridge) = SimulationHost::spawn(CountingSim::new(2, None));
        let trace = run_episode(&bridge, &mut Fixed(1), true, Some(7)).unwrap();
        assert_eq!(trace.result.length, 7);
        assert!(trace.result.truncated);
        assert!(!trace.result.is_win());
    }

    #[test]
    fn test_parity_outcomes_alternate() {
        let (_host, bridge) = SimulationHost::spawn(ParitySim::new());
        let mut agent = RandomAgent::with_seed(2, 1);
        let wins: Vec<bool> = (0..4)
            .map(|_| run_episode(&bridge, &mut agent, false, None).unwrap().result.is_win())
            .collect();
        assert_eq!(wins, vec![true, false, true, false]);
    }

    #[test]
    fn test_fault_abandons_episode() {
        let (_host, bridge) = SimulationHost::spawn(ParitySim::with_faulty_episodes(vec![0]));
        let err = run_episode(&bridge, &mut Fixed(0), true, None).err().unwrap();
        assert!(matches!(err, BridgeError::SimulationFault { operation: "step", .. }));

        // the host keeps serving; episode 1 is a loss
        let trace = run_episode(&bridge, &mut Fixed(0), true, None).unwrap();
        assert!(!trace.result.is_win());
    }

    #[test]
    fn test_closed_bridge_is_reported() {
        let (mut host, bridge) = SimulationHost::spawn(CountingSim::new(2, Some(2)));
        host.shutdown();
        let err = run_episode(&bridge, &mut Fixed(0), true, None).err().unwrap();
        assert_eq!(err, BridgeError::Closed);
    }
}
