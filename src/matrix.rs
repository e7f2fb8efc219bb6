//! Matrix expansion
//!
//! A matrix maps each variable (axis) to the values it takes. Expansion
//! produces one [`Job`] per cartesian combination, axes in declaration
//! order with the last axis varying fastest:
//!
//! ```text
//! algorithm: [pc, ges]      (pc, asia) (pc, cancer)
//! dataset:   [asia, cancer] (ges, asia) (ges, cancer)
//! ```

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::MatrixError;

/// Axis name -> candidate values, in declaration order
pub type MatrixSpec = IndexMap<String, Vec<Value>>;

/// One combination: axis name -> selected value, in declaration order
pub type Job = IndexMap<String, Value>;

/// Upper bound on the number of jobs a single matrix may produce
pub const DEFAULT_MAX_JOBS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixExpander {
    max_jobs: usize,
}

impl Default for MatrixExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixExpander {
    pub fn new() -> Self {
        Self {
            max_jobs: DEFAULT_MAX_JOBS,
        }
    }

    pub fn with_max_jobs(max_jobs: usize) -> Self {
        Self { max_jobs }
    }

    /// Number of jobs `matrix` expands to, checked against the limit
    pub fn job_count(&self, matrix: &MatrixSpec) -> Result<usize, MatrixError> {
        let mut count: usize = 1;
        for (axis, values) in matrix {
            if values.is_empty() {
                return Err(MatrixError::EmptyAxis { axis: axis.clone() });
            }
            count = count
                .checked_mul(values.len())
                .ok_or_else(|| MatrixError::Overflow { axis: axis.clone() })?;
        }
        if count > self.max_jobs {
            return Err(MatrixError::TooManyJobs {
                count,
                limit: self.max_jobs,
            });
        }
        Ok(count)
    }

    /// Expand into the ordered job list. An empty matrix yields one empty job.
    pub fn expand(&self, matrix: &MatrixSpec) -> Result<Vec<Job>, MatrixError> {
        let count = self.job_count(matrix)?;

        let mut jobs: Vec<Job> = Vec::with_capacity(count);
        jobs.push(Job::with_capacity(matrix.len()));

        for (axis, values) in matrix {
            jobs = jobs
                .into_iter()
                .flat_map(|job| {
                    values.iter().map(move |value| {
                        let mut next = job.clone();
                        next.insert(axis.clone(), value.clone());
                        next
                    })
                })
                .collect();
        }

        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn matrix(axes: &[(&str, Vec<Value>)]) -> MatrixSpec {
        axes.iter()
            .map(|(name, values)| (name.to_string(), values.clone()))
            .collect()
    }

    fn job(pairs: &[(&str, Value)]) -> Job {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn empty_matrix_yields_single_empty_job() {
        let jobs = MatrixExpander::new().expand(&MatrixSpec::new()).unwrap();
        assert_eq!(jobs, vec![Job::new()]);
    }

    #[test]
    fn two_axes_last_varies_fastest() {
        let spec = matrix(&[
            ("algorithm", vec![json!("pc"), json!("ges")]),
            ("dataset", vec![json!("asia"), json!("cancer")]),
        ]);

        let jobs = MatrixExpander::new().expand(&spec).unwrap();

        assert_eq!(
            jobs,
            vec![
                job(&[("algorithm", json!("pc")), ("dataset", json!("asia"))]),
                job(&[("algorithm", json!("pc")), ("dataset", json!("cancer"))]),
                job(&[("algorithm", json!("ges")), ("dataset", json!("asia"))]),
                job(&[("algorithm", json!("ges")), ("dataset", json!("cancer"))]),
            ]
        );
    }

    #[test]
    fn single_axis() {
        let spec = matrix(&[("algorithm", vec![json!("pc"), json!("ges"), json!("lingam")])]);
        let jobs = MatrixExpander::new().expand(&spec).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[2], job(&[("algorithm", json!("lingam"))]));
    }

    #[test]
    fn jobs_keep_axis_declaration_order() {
        let spec = matrix(&[
            ("dataset", vec![json!("asia"), json!("cancer"), json!("alarm")]),
            ("algorithm", vec![json!("pc"), json!("ges")]),
            ("alpha", vec![json!(0.01), json!(0.05)]),
        ]);

        let jobs = MatrixExpander::new().expand(&spec).unwrap();

        assert_eq!(jobs.len(), 12);
        for j in &jobs {
            let keys: Vec<&str> = j.keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["dataset", "algorithm", "alpha"]);
        }
        assert!(jobs.contains(&job(&[
            ("dataset", json!("asia")),
            ("algorithm", json!("pc")),
            ("alpha", json!(0.01)),
        ])));
    }

    #[test]
    fn composite_values_are_kept_intact() {
        let spec = matrix(&[("params", vec![json!({"k": 2}), json!([1, 2])])]);
        let jobs = MatrixExpander::new().expand(&spec).unwrap();
        assert_eq!(jobs[0]["params"], json!({"k": 2}));
        assert_eq!(jobs[1]["params"], json!([1, 2]));
    }

    #[test]
    fn empty_axis_is_rejected() {
        let spec = matrix(&[("algorithm", vec![json!("pc")]), ("dataset", vec![])]);
        let err = MatrixExpander::new().expand(&spec).unwrap_err();
        assert_eq!(
            err,
            MatrixError::EmptyAxis {
                axis: "dataset".into()
            }
        );
    }

    #[test]
    fn job_limit_is_enforced() {
        let values: Vec<Value> = (0..10).map(|i| json!(i)).collect();
        let spec = matrix(&[("a", values.clone()), ("b", values)]);
        let err = MatrixExpander::with_max_jobs(50).expand(&spec).unwrap_err();
        assert_eq!(err, MatrixError::TooManyJobs { count: 100, limit: 50 });
    }

    proptest! {
        #[test]
        fn job_count_is_product_of_axis_lengths(lengths in prop::collection::vec(1usize..5, 0..4)) {
            let spec: MatrixSpec = lengths
                .iter()
                .enumerate()
                .map(|(i, n)| (format!("v{}", i), (0..*n).map(|k| json!(k)).collect()))
                .collect();

            let expander = MatrixExpander::new();
            let first = expander.expand(&spec).unwrap();
            let second = expander.expand(&spec).unwrap();

            prop_assert_eq!(first.len(), lengths.iter().product::<usize>());
            prop_assert_eq!(&first, &second);
            let head: Job = spec.iter().map(|(k, v)| (k.clone(), v[0].clone())).collect();
            prop_assert_eq!(&first[0], &head);
        }
    }
}
