//! Pure folds of a status sample into a condition's derived metrics.
//!
//! Kept free of side effects so the numeric contract can be pinned by unit
//! tests without a scheduler or repository in the loop.

/// The derived metrics carried by each trigger state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedMetrics {
    /// Contiguous uptime in hours.
    pub uptime_hours: f64,
    /// Running average of observed bandwidth over the uptime window, in
    /// KB/s.
    pub avg_bandwidth_kbps: f64,
}

/// Folds one status sample into the prior metrics.
///
/// The bandwidth average follows `A' = A - A/H + S/H` where `H` is the
/// prior uptime in hours, clamped to at least 1 before dividing. A prior
/// uptime of zero means this is the first sample of an episode, so the
/// average restarts at the sample value. A down relay resets both metrics:
/// the uptime window and its average only ever describe one contiguous up
/// episode.
///
/// `elapsed_hours` is wall-clock time since the previous successful
/// sample, so a missed poll neither delays nor accelerates accumulation.
pub fn fold(prior: DerivedMetrics, up: bool, sample_kbps: f64, elapsed_hours: f64) -> DerivedMetrics {
    if !up {
        return DerivedMetrics::default();
    }

    let avg_bandwidth_kbps = if prior.uptime_hours <= 0.0 {
        sample_kbps
    } else {
        let hours = prior.uptime_hours.max(1.0);
        prior.avg_bandwidth_kbps - prior.avg_bandwidth_kbps / hours + sample_kbps / hours
    };

    DerivedMetrics {
        uptime_hours: prior.uptime_hours + elapsed_hours.max(0.0),
        avg_bandwidth_kbps,
    }
}
