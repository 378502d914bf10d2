use crate::types::{FogError, FogResult, Grid, Mask};
use ndarray::Zip;

/// Result of one filter application: the pass-through value grid and the
/// accumulated exclusion mask (inbound mask OR-merged with the filter mask).
#[derive(Debug, Clone)]
pub struct FilterResult {
    pub values: Grid,
    pub mask: Mask,
}

impl FilterResult {
    /// Start of a filter chain: nothing masked yet.
    pub fn unmasked(values: Grid) -> Self {
        let mask = Mask::from_elem(values.raw_dim(), false);
        FilterResult { values, mask }
    }
}

/// Summary statistics for one filter application. Observational only, the
/// numbers are logged and never fed back into any mask decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    /// Total number of pixels in the scene
    pub size: usize,
    /// Pixels already excluded by the inbound mask
    pub previously_masked: usize,
    /// Pixels excluded by this filter for the first time
    pub newly_masked: usize,
    /// Pixels excluded after merging
    pub total_masked: usize,
    /// Pixels still under consideration
    pub remaining: usize,
}

impl FilterStats {
    pub fn collect(inmask: &Mask, merged: &Mask) -> Self {
        let size = merged.len();
        let previously_masked = inmask.iter().filter(|&&m| m).count();
        let total_masked = merged.iter().filter(|&&m| m).count();
        FilterStats {
            size,
            previously_masked,
            newly_masked: total_masked - previously_masked,
            total_masked,
            remaining: size - total_masked,
        }
    }

    pub fn log(&self, name: &str) {
        log::info!(
            "Filter results for <{}>: size {}, previously masked {}, newly masked {}, \
             total masked {}, remaining {}",
            name,
            self.size,
            self.previously_masked,
            self.newly_masked,
            self.total_masked,
            self.remaining
        );
    }
}

/// The masking stage contract.
///
/// Every filter declares its required scene inputs, computes an exclusion
/// mask from them and merges it with the inbound mask. Masks accumulate
/// monotonically along a filter chain: `apply` only ever adds excluded
/// pixels, never removes them.
pub trait ArrayFilter {
    /// Filter name used in errors and log output.
    fn name(&self) -> &'static str;

    /// Names of required scene inputs that were not supplied.
    fn missing_inputs(&self) -> Vec<&'static str>;

    /// Shapes of the supplied input grids, checked against the value grid.
    fn input_shapes(&self) -> Vec<(&'static str, (usize, usize))>;

    /// The filter algorithm: compute this filter's own exclusion mask.
    fn compute_mask(&self, values: &Grid, inmask: &Mask) -> FogResult<Mask>;

    /// Test applicability, reporting every missing input. Never fails.
    fn is_applicable(&self) -> bool {
        let missing = self.missing_inputs();
        for attr in &missing {
            log::warn!("Filter <{}> missing input: {}", self.name(), attr);
        }
        missing.is_empty()
    }

    /// Run the filter on a value grid and inbound mask.
    ///
    /// Fails with [`FogError::Inapplicable`] when required inputs are
    /// missing and with [`FogError::ShapeMismatch`] when any input grid does
    /// not share the scene shape. On success the returned mask is the
    /// logical OR of the inbound mask and the computed filter mask.
    fn apply(&self, values: &Grid, inmask: &Mask) -> FogResult<FilterResult> {
        if !self.is_applicable() {
            return Err(FogError::Inapplicable {
                filter: self.name(),
                missing: self.missing_inputs(),
            });
        }

        let expected = values.dim();
        if inmask.dim() != expected {
            return Err(FogError::ShapeMismatch {
                name: "inmask",
                expected,
                actual: inmask.dim(),
            });
        }
        for (name, actual) in self.input_shapes() {
            if actual != expected {
                return Err(FogError::ShapeMismatch {
                    name,
                    expected,
                    actual,
                });
            }
        }

        let mask = self.compute_mask(values, inmask)?;
        debug_assert_eq!(mask.dim(), expected);

        let merged = Zip::from(inmask).and(&mask).map_collect(|&a, &b| a | b);
        FilterStats::collect(inmask, &merged).log(self.name());

        Ok(FilterResult {
            values: values.clone(),
            mask: merged,
        })
    }
}

/// Fetch a required input, erroring with the owning filter's name when it
/// was not supplied. Used by `compute_mask` implementations so they stay
/// safe to call outside `apply` as well.
pub(crate) fn require<'a, T>(
    input: &'a Option<T>,
    name: &'static str,
    filter: &'static str,
) -> FogResult<&'a T> {
    input.as_ref().ok_or(FogError::Inapplicable {
        filter,
        missing: vec![name],
    })
}

/// Collect the names of required inputs that are `None`.
///
/// Helper for `missing_inputs` implementations: pass `(name, is_present)`
/// pairs for every required field.
pub(crate) fn missing_from(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect()
}
