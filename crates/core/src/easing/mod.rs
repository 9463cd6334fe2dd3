/// Cubic ease-out over a normalised progress value.
///
/// `progress` is clamped to `[0, 1]`; the curve starts fast and decelerates
/// into exactly `1.0` at the end.
pub fn ease_out_cubic(progress: f32) -> f32 {
    let t = progress.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_the_endpoints_exactly() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
    }

    #[test]
    fn decelerates_towards_the_end() {
        assert!((ease_out_cubic(0.5) - 0.875).abs() < 1e-6);

        let early = ease_out_cubic(0.1) - ease_out_cubic(0.0);
        let late = ease_out_cubic(1.0) - ease_out_cubic(0.9);
        assert!(early > late);
    }

    #[test]
    fn clamps_out_of_range_progress() {
        assert_eq!(ease_out_cubic(-3.0), 0.0);
        assert_eq!(ease_out_cubic(7.5), 1.0);
    }
}
