//! Data generators for the demo plots.

/// Bar heights `0, 10, 20, ...`, one per bar.
pub fn bar_values(n: usize) -> Vec<f32> {
    (0..n).map(|i| i as f32 * 10.0).collect()
}

/// `n` samples of `amplitude * sin(x)` with `x` evenly spaced over `[a, b]`.
///
/// Both endpoints are included when `n >= 2`; a single sample sits at `a`.
pub fn sine_samples(n: usize, a: f32, b: f32, amplitude: f32) -> (Vec<f32>, Vec<f32>) {
    let step = if n > 1 { (b - a) / (n - 1) as f32 } else { 0.0 };
    let xs: Vec<f32> = (0..n).map(|i| a + step * i as f32).collect();
    let ys = xs.iter().map(|x| amplitude * x.sin()).collect();
    (xs, ys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bar_values_small() {
        assert!(bar_values(0).is_empty());
        assert_eq!(bar_values(4), vec![0.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_sine_samples_endpoints() {
        let (xs, ys) = sine_samples(5, 0.0, 4.0, 2.0);
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ys[0], 0.0);
        assert!((ys[1] - 2.0 * 1.0f32.sin()).abs() < 1e-6);
    }

    #[test]
    fn test_sine_samples_single_point() {
        let (xs, ys) = sine_samples(1, 1.5, 9.0, 1.0);
        assert_eq!(xs, vec![1.5]);
        assert_eq!(ys, vec![1.5f32.sin()]);
    }

    proptest! {
        #[test]
        fn bar_values_len_and_order(n in 0usize..2048) {
            let values = bar_values(n);
            prop_assert_eq!(values.len(), n);
            prop_assert!(values.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn sine_samples_shape(
            n in 0usize..1024,
            a in -100.0f32..100.0,
            span in 0.0f32..100.0,
            amplitude in -10.0f32..10.0,
        ) {
            let (xs, ys) = sine_samples(n, a, a + span, amplitude);
            prop_assert_eq!(xs.len(), n);
            prop_assert_eq!(ys.len(), n);
            if n > 0 {
                prop_assert_eq!(xs[0], a);
                prop_assert_eq!(ys[0], amplitude * a.sin());
            }
            for y in &ys {
                prop_assert!(y.abs() <= amplitude.abs() + 1e-6);
            }
        }
    }
}
