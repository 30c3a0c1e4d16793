use faer_core::Mat;

/// Pivot bookkeeping reused across inversions.
#[derive(Debug, Clone)]
pub(crate) struct PivotWork {
    used: Vec<bool>,
    rows: Vec<usize>,
    cols: Vec<usize>,
}

impl PivotWork {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            used: vec![false; n],
            rows: vec![0; n],
            cols: vec![0; n],
        }
    }
}

fn swap_rows(a: &mut Mat<f64>, r1: usize, r2: usize) {
    for col in 0..a.ncols() {
        let tmp = a.read(r1, col);
        a.write(r1, col, a.read(r2, col));
        a.write(r2, col, tmp);
    }
}

fn swap_cols(a: &mut Mat<f64>, c1: usize, c2: usize) {
    for row in 0..a.nrows() {
        let tmp = a.read(row, c1);
        a.write(row, c1, a.read(row, c2));
        a.write(row, c2, tmp);
    }
}

/// Invert a square matrix in place by Gauss-Jordan elimination with full pivoting.
///
/// Each step takes the largest-magnitude entry of the unprocessed submatrix
/// as pivot. Returns the determinant, or `None` when a zero pivot shows the
/// matrix is singular; `a` is left partially reduced in that case.
pub(crate) fn invert_full_pivot(a: &mut Mat<f64>, work: &mut PivotWork) -> Option<f64> {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols());
    debug_assert!(work.used.len() >= n);
    work.used[..n].fill(false);
    let mut det = 1.0;

    for i in 0..n {
        let mut big = 0.0;
        let mut irow = 0;
        let mut icol = 0;
        for j in 0..n {
            if work.used[j] {
                continue;
            }
            for k in 0..n {
                if work.used[k] {
                    continue;
                }
                let v = a.read(j, k).abs();
                if v > big {
                    big = v;
                    irow = j;
                    icol = k;
                }
            }
        }
        if big == 0.0 {
            return None;
        }
        work.used[icol] = true;

        if irow != icol {
            swap_rows(a, irow, icol);
            det = -det;
        }
        work.rows[i] = irow;
        work.cols[i] = icol;

        let pivot = a.read(icol, icol);
        det *= pivot;
        let inv = 1.0 / pivot;
        a.write(icol, icol, 1.0);
        for col in 0..n {
            a.write(icol, col, a.read(icol, col) * inv);
        }

        for row in 0..n {
            if row == icol {
                continue;
            }
            let factor = a.read(row, icol);
            if factor == 0.0 {
                continue;
            }
            a.write(row, icol, 0.0);
            for col in 0..n {
                a.write(row, col, a.read(row, col) - a.read(icol, col) * factor);
            }
        }
    }

    for i in (0..n).rev() {
        if work.rows[i] != work.cols[i] {
            swap_cols(a, work.rows[i], work.cols[i]);
        }
    }
    Some(det)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer_core::mul::matmul;
    use faer_core::Parallelism;

    #[test]
    fn inverts_with_pivoting() {
        let src = [[0.0, 2.0, 1.0], [1.0, 0.0, 0.0], [3.0, 1.0, 4.0]];
        let orig = Mat::from_fn(3, 3, |i, j| src[i][j]);
        let mut a = orig.clone();
        let mut work = PivotWork::new(3);
        let det = invert_full_pivot(&mut a, &mut work).unwrap();
        assert!((det - (-7.0)).abs() < 1e-12);

        let mut prod = Mat::<f64>::zeros(3, 3);
        matmul(prod.as_mut(), orig.as_ref(), a.as_ref(), None, 1.0, Parallelism::None);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((prod.read(i, j) - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn singular_matrix_reports_none() {
        let mut a = Mat::from_fn(2, 2, |i, _| (i + 1) as f64);
        let mut work = PivotWork::new(2);
        assert!(invert_full_pivot(&mut a, &mut work).is_none());
    }
}
