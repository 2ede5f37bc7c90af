//! The bid scoring function (C4): pure, side-effect-free, no I/O.
//!
//! `S = α·P + β/(T+1) + γ·W`. Price grows the score linearly, the time
//! term falls hyperbolically so early bids keep a bounded advantage
//! capped at β, and weight contributes a flat reputation prior.

/// Computes a bid's score.
///
/// `price` is the bid amount, `elapsed_ms` the milliseconds since
/// campaign start (clamped to 0 by the caller), `weight` the bidder's
/// reputation weight, and `alpha`/`beta`/`gamma` the campaign's
/// coefficients.
pub fn score(price: f64, elapsed_ms: i64, weight: f64, alpha: f64, beta: f64, gamma: f64) -> f64 {
    let t = elapsed_ms.max(0) as f64;
    alpha * price + beta / (t + 1.0) + gamma * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, rel_epsilon: f64) -> bool {
        (a - b).abs() <= rel_epsilon * b.abs().max(1.0)
    }

    #[test]
    fn single_bid_example() {
        let s = score(1000.0, 500, 2.0, 1.0, 1000.0, 100.0);
        assert!(approx_eq(s, 1201.996, 1e-5), "got {s}");
    }

    #[test]
    fn overbid_by_same_user_example() {
        let s = score(1500.0, 3000, 2.0, 1.0, 1000.0, 100.0);
        assert!(approx_eq(s, 1700.333, 1e-5), "got {s}");
    }

    #[test]
    fn tie_break_equal_scores() {
        let s1 = score(1000.0, 0, 1.0, 1.0, 1000.0, 100.0);
        let s2 = score(1000.0, 0, 1.0, 1.0, 1000.0, 100.0);
        assert!(approx_eq(s1, 2100.0, 1e-9));
        assert_eq!(s1, s2);
    }

    #[test]
    fn settlement_ranking_example() {
        let scores = [2100.0, 2000.0, 1900.0, 1800.0, 1700.0];
        let mut sorted = scores;
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(sorted, scores);
    }

    #[test]
    fn zero_elapsed_keeps_time_term_finite() {
        let s = score(0.0, 0, 0.0, 1.0, 1000.0, 100.0);
        assert!(s.is_finite());
        assert_eq!(s, 1000.0);
    }

    #[test]
    fn time_term_bounded_by_beta() {
        let s = score(0.0, 0, 0.0, 0.0, 1000.0, 0.0);
        assert!(s <= 1000.0);
    }

    /// P2 — recomputing from stored inputs matches the stored score.
    #[test]
    fn score_consistency_property() {
        let cases = [
            (1000.0, 500_i64, 2.0, 1.0, 1000.0, 100.0),
            (1500.0, 3000, 2.0, 1.0, 1000.0, 100.0),
            (250.5, 12_345, 0.5, 2.0, 500.0, 10.0),
        ];
        for (price, elapsed, weight, alpha, beta, gamma) in cases {
            let stored = score(price, elapsed, weight, alpha, beta, gamma);
            let recomputed = alpha * price + beta / (elapsed.max(0) as f64 + 1.0) + gamma * weight;
            assert!(approx_eq(stored, recomputed, 1e-6));
        }
    }
}
