//! Composite sentiment score derived from classifier probability triples.

/// Computes the 0-100 composite score from a probability triple.
///
/// base = prob_pos - prob_neg, confidence = 1 - prob_neu,
/// score = clamp((base * confidence + 1) / 2 * 100, 0, 100), rounded to two
/// decimal places. A fully neutral article scores exactly 50.
pub fn composite_score(prob_pos: f64, prob_neu: f64, prob_neg: f64) -> f64 {
    let base = prob_pos - prob_neg;
    let confidence = 1.0 - prob_neu;
    let raw = (base * confidence + 1.0) / 2.0 * 100.0;
    round2(raw.clamp(0.0, 100.0))
}

/// Rounds to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mostly_positive_article() {
        // base = 0.7, confidence = 0.9, composite = 0.63
        assert_eq!(composite_score(0.8, 0.1, 0.1), 81.5);
    }

    #[test]
    fn fully_neutral_article_scores_midpoint() {
        assert_eq!(composite_score(0.0, 1.0, 0.0), 50.0);
    }

    #[test]
    fn fully_negative_article_clamps_at_floor() {
        assert_eq!(composite_score(0.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn fully_positive_article_clamps_at_ceiling() {
        assert_eq!(composite_score(1.0, 0.0, 0.0), 100.0);
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        let score = composite_score(0.61, 0.2, 0.17);
        assert_eq!(score, round2(score));
        assert_eq!(round2(81.4999), 81.5);
    }
}
