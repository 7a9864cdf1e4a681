//! Transcendental special functions used by the operator table.

/// Error function `erf(x) = (2/sqrt(pi)) * integral_0^x e^(-t^2) dt`.
///
/// Taylor series with Kahan summation for numerical stability.
///
/// Reference: DLMF §7.6.1 <https://dlmf.nist.gov/7.6#E1>
pub fn eval_erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let coeff = 2.0 / std::f64::consts::PI.sqrt();

    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    let mut factorial = 1.0_f64;
    let mut power = x;

    for n in 0..30_u32 {
        let two_n_plus_one = f64::from(2 * n + 1);
        let term = power / (factorial * two_n_plus_one);
        if term.is_nan() || term.is_infinite() {
            break;
        }

        let signed_term = if n % 2 == 0 { term } else { -term };
        let y = signed_term - compensation;
        let t = sum + y;
        compensation = (t - sum) - y;
        sum = t;

        factorial *= f64::from(n + 1);
        power *= x * x;

        if term.abs() < f64::EPSILON {
            break;
        }
    }
    sign * coeff * sum
}

/// Complementary error function `erfc(x) = 1 - erf(x)`.
pub fn eval_erfc(x: f64) -> f64 {
    1.0 - eval_erf(x)
}

/// Gamma function using the Lanczos approximation (g = 7).
///
/// Uses the reflection formula `Gamma(z)Gamma(1-z) = pi / sin(pi*z)` for `x < 0.5`.
/// Returns `None` at non-positive integer poles.
///
/// Reference: Lanczos (1964) "A Precision Approximation of the Gamma Function",
/// SIAM J. Numerical Analysis, Ser. B, Vol. 1, pp. 86-96.
pub fn eval_gamma(x: f64) -> Option<f64> {
    if x <= 0.0 && x.fract() == 0.0 {
        return None;
    }
    const G: f64 = 7.0;
    const C: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        let denom = (std::f64::consts::PI * x).sin() * eval_gamma(1.0 - x)?;
        return Some(std::f64::consts::PI / denom);
    }

    let x = x - 1.0;
    let mut ag = C[0];
    for (i, coeff) in C.iter().enumerate().skip(1) {
        ag += coeff / (x + i as f64);
    }
    let t = x + G + 0.5;
    let two_pi_sqrt = (2.0 * std::f64::consts::PI).sqrt();
    Some(two_pi_sqrt * t.powf(x + 0.5) * (-t).exp() * ag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erf_known_values() {
        assert!((eval_erf(0.0)).abs() < 1e-12);
        assert!((eval_erf(1.0) - 0.842_700_792_949_714_9).abs() < 1e-9);
        assert!((eval_erfc(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gamma_known_values() {
        assert!((eval_gamma(1.0).expect("gamma(1) defined") - 1.0).abs() < 1e-9);
        assert!((eval_gamma(5.0).expect("gamma(5) defined") - 24.0).abs() < 1e-7);
        assert!(eval_gamma(0.0).is_none());
        assert!(eval_gamma(-2.0).is_none());
    }
}
