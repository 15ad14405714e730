//! Reset of recurrent states at episode boundaries.
//!
//! After every environment step, the state of an agent whose done flag is set is
//! replaced by the zero state and its continuation mask becomes 0; every other
//! agent keeps the state produced by the policy and a mask of 1. Thus a mask
//! of 0 always comes with a zero state, and an agent is never reset by the done
//! flag of another.
use crate::{error::CohortError, util::check_shape};
use ndarray::{s, Array3, Array4, ArrayView2};

/// Continuation masks `[n_threads, n_agents, 1]` for done flags `[n_threads, n_agents]`.
pub fn continuation_masks(dones: ArrayView2<bool>) -> Array3<f32> {
    let (n, a) = dones.dim();
    Array3::from_shape_fn((n, a, 1), |(e, i, _)| if dones[[e, i]] { 0. } else { 1. })
}

/// Zeroes the states `[n_threads, n_agents, recurrent_n, hidden_size]` of done agents.
pub fn reset_done_states(
    dones: ArrayView2<bool>,
    states: &mut Array4<f32>,
) -> Result<(), CohortError> {
    let (n, a) = dones.dim();
    let shape = states.shape();
    let expected = [n, a, shape[2], shape[3]];
    check_shape("recurrent states", &expected, shape)?;

    for ((e, i), &done) in dones.indexed_iter() {
        if done {
            states.slice_mut(s![e, i, .., ..]).fill(0.);
        }
    }
    Ok(())
}

/// Applies the reset to actor and critic states at once and returns the masks.
pub fn apply_dones(
    dones: ArrayView2<bool>,
    rnn_states: &mut Array4<f32>,
    rnn_states_critic: &mut Array4<f32>,
) -> Result<Array3<f32>, CohortError> {
    reset_done_states(dones, rnn_states)?;
    reset_done_states(dones, rnn_states_critic)?;
    Ok(continuation_masks(dones))
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{array, Axis};

    #[test]
    fn test_apply_dones() {
        let dones = array![[false, true], [true, false], [false, false]];
        let mut actor = Array4::from_elem((3, 2, 1, 4), 0.5);
        let mut critic = Array4::from_elem((3, 2, 1, 4), -0.5);
        let masks = apply_dones(dones.view(), &mut actor, &mut critic).unwrap();

        for ((e, i), &done) in dones.indexed_iter() {
            let m = masks[[e, i, 0]];
            let a = actor.slice(s![e, i, .., ..]);
            let c = critic.slice(s![e, i, .., ..]);
            if done {
                assert_eq!(m, 0.);
                assert!(a.iter().chain(c.iter()).all(|&x| x == 0.));
            } else {
                assert_eq!(m, 1.);
                assert!(a.iter().all(|&x| x == 0.5));
                assert!(c.iter().all(|&x| x == -0.5));
            }
        }
        assert_eq!(masks.len_of(Axis(0)), 3);
    }

    #[test]
    fn test_reset_rejects_mismatched_batch() {
        let dones = array![[true, true]];
        let mut states = Array4::zeros((2, 2, 1, 4));
        assert!(reset_done_states(dones.view(), &mut states).is_err());
    }
}
