//! Small dense linear algebra for penalised least squares

use crate::{MathError, Result};

/// Solve `A x = b` for symmetric positive definite `A` via Cholesky.
pub fn solve_symmetric(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a {n}x{n} system, got {} rows",
            a.len()
        )));
    }

    // A = L L'
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(MathError::CalculationError(
                        "Matrix is not positive definite".to_string(),
                    ));
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // L' x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    Ok(x)
}

/// Minimise `||y - X b||^2 + sum_j penalty[j] * b[j]^2`.
///
/// `design` is row-major (one inner `Vec` per observation).
pub fn ridge_least_squares(design: &[Vec<f64>], y: &[f64], penalty: &[f64]) -> Result<Vec<f64>> {
    if design.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but target has {}",
            design.len(),
            y.len()
        )));
    }
    let p = penalty.len();
    if design.iter().any(|row| row.len() != p) {
        return Err(MathError::InvalidInput(format!(
            "Every design row must have {p} columns"
        )));
    }

    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for (row, &target) in design.iter().zip(y) {
        for i in 0..p {
            if row[i] == 0.0 {
                continue;
            }
            xty[i] += row[i] * target;
            for j in 0..=i {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..p {
        xtx[i][i] += penalty[i];
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
    }

    solve_symmetric(&xtx, &xty)
}
