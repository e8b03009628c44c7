/// Fixed-threshold match decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    threshold: f32,
}

impl DecisionPolicy {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// A pair matches when its score reaches the threshold.
    pub fn decide(&self, score: f32) -> bool {
        score >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        let policy = DecisionPolicy::new(0.8);
        assert!(policy.decide(0.8));
        assert!(policy.decide(1.0));
        assert!(!policy.decide(0.7999));
    }

    #[test]
    fn test_raising_threshold_only_flips_to_false() {
        let score = 0.75;
        let mut previous = true;
        for step in 0..=20 {
            let decision = DecisionPolicy::new(step as f32 / 20.0).decide(score);
            assert!(previous || !decision, "verdict flipped back to true at step {step}");
            previous = decision;
        }
        assert!(!previous);
    }
}
