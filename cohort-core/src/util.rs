//! Utilities for moving batches between the per-thread and the flattened layout.
use crate::{error::CohortError, record::Record};
use ndarray::{Array, ArrayView, Dimension};

/// Merges the two leading axes `[n_threads, n_agents, ...]` into one
/// `[n_threads * n_agents, ...]`, thread-major.
pub fn flatten_threads<A, D>(x: ArrayView<A, D>) -> Result<Array<A, D::Smaller>, CohortError>
where
    A: Clone,
    D: Dimension,
{
    let shape = x.shape().to_vec();
    if shape.len() < 2 {
        return Err(CohortError::ShapeMismatch {
            name: "batch to flatten".to_string(),
            expected: vec![0, 0],
            actual: shape,
        });
    }
    let mut dim = D::Smaller::zeros(shape.len() - 1);
    {
        let d = dim.slice_mut();
        d[0] = shape[0] * shape[1];
        d[1..].copy_from_slice(&shape[2..]);
    }
    let x = x.as_standard_layout().into_owned();
    x.into_shape(dim).map_err(|_| CohortError::ShapeMismatch {
        name: "batch to flatten".to_string(),
        expected: vec![],
        actual: shape,
    })
}

/// Splits the leading axis `[n_threads * n_agents, ...]` into
/// `[n_threads, n_agents, ...]`, the inverse of [`flatten_threads`].
pub fn unflatten_threads<A, D>(
    x: ArrayView<A, D>,
    n_threads: usize,
) -> Result<Array<A, D::Larger>, CohortError>
where
    A: Clone,
    D: Dimension,
{
    let shape = x.shape().to_vec();
    if shape.is_empty() || n_threads == 0 || shape[0] % n_threads != 0 {
        return Err(CohortError::ShapeMismatch {
            name: format!("batch to split into {} threads", n_threads),
            expected: vec![],
            actual: shape,
        });
    }
    let mut dim = D::Larger::zeros(shape.len() + 1);
    {
        let d = dim.slice_mut();
        d[0] = n_threads;
        d[1] = shape[0] / n_threads;
        d[2..].copy_from_slice(&shape[1..]);
    }
    let x = x.as_standard_layout().into_owned();
    x.into_shape(dim).map_err(|_| CohortError::ShapeMismatch {
        name: format!("batch to split into {} threads", n_threads),
        expected: vec![],
        actual: shape,
    })
}

/// Fails with [`CohortError::ShapeMismatch`] unless `actual == expected`.
pub(crate) fn check_shape(name: &str, expected: &[usize], actual: &[usize]) -> Result<(), CohortError> {
    if expected != actual {
        return Err(CohortError::ShapeMismatch {
            name: name.to_string(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

fn require(info: &Record, key: &str, thread: usize) -> Result<(), CohortError> {
    if !info.contains_key(key) {
        return Err(CohortError::MissingInfo {
            key: key.to_string(),
            thread,
        });
    }
    Ok(())
}

/// Reads a scalar the environment must report in the info of `thread`.
pub(crate) fn info_scalar(info: &Record, key: &str, thread: usize) -> Result<f32, CohortError> {
    require(info, key, thread)?;
    info.get_scalar(key)
}

/// Reads a 1-dimensional array the environment must report in the info of `thread`.
pub(crate) fn info_array1(info: &Record, key: &str, thread: usize) -> Result<Vec<f32>, CohortError> {
    require(info, key, thread)?;
    info.get_array1(key)
}

/// Reads a 3-dimensional array the environment must report in the info of `thread`.
pub(crate) fn info_array3(
    info: &Record,
    key: &str,
    thread: usize,
) -> Result<(Vec<f32>, [usize; 3]), CohortError> {
    require(info, key, thread)?;
    info.get_array3(key)
}

/// Returns `true` if a step counter moving from `prev` to `current` crosses a
/// multiple of `interval`. An interval of 0 never fires.
pub fn crosses_interval(prev: usize, current: usize, interval: usize) -> bool {
    interval > 0 && current / interval > prev / interval
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{Array2, Array3, Array4};

    #[test]
    fn test_flatten_round_trip() {
        for &(n, a) in [(1usize, 1usize), (1, 3), (4, 1), (3, 5)].iter() {
            let x = Array4::from_shape_fn((n, a, 2, 3), |(e, i, j, k)| {
                (e * 1000 + i * 100 + j * 10 + k) as f32
            });
            let flat = flatten_threads(x.view()).unwrap();
            assert_eq!(flat.shape(), &[n * a, 2, 3]);

            // Thread-major: row e * a + i holds agent i of thread e
            for e in 0..n {
                for i in 0..a {
                    assert_eq!(flat[[e * a + i, 1, 2]], x[[e, i, 1, 2]]);
                }
            }

            let back = unflatten_threads(flat.view(), n).unwrap();
            assert_eq!(back, x);
        }
    }

    #[test]
    fn test_flatten_non_standard_layout() {
        let x = Array3::from_shape_fn((3, 2, 1), |(e, i, _)| (e * 2 + i) as f32);
        let t = x.view().permuted_axes([1, 0, 2]);
        let flat = flatten_threads(t).unwrap();
        assert_eq!(flat.column(0).to_vec(), vec![0., 2., 4., 1., 3., 5.]);
    }

    #[test]
    fn test_unflatten_rejects_uneven_split() {
        let x = Array2::<f32>::zeros((5, 1));
        assert!(unflatten_threads(x.view(), 2).is_err());
        assert!(unflatten_threads(x.view(), 0).is_err());
    }

    #[test]
    fn test_info_fields() {
        let mut info = Record::from_scalar("score_reward", 1.5);
        info.insert("delta_steps", crate::record::RecordValue::Array1(vec![1., 2.]));
        assert_eq!(info_scalar(&info, "score_reward", 0).unwrap(), 1.5);
        assert_eq!(info_array1(&info, "delta_steps", 0).unwrap(), vec![1., 2.]);
        assert!(matches!(
            info_scalar(&info, "steps_left", 3),
            Err(CohortError::MissingInfo { thread: 3, .. })
        ));
        assert!(matches!(
            info_scalar(&info, "delta_steps", 0),
            Err(CohortError::RecordValueTypeError(_))
        ));
    }

    #[test]
    fn test_crosses_interval() {
        assert!(crosses_interval(0, 400, 400));
        assert!(!crosses_interval(400, 799, 400));
        assert!(crosses_interval(799, 801, 400));
        assert!(crosses_interval(0, 300, 250));
        assert!(!crosses_interval(0, 300, 0));
    }
}
