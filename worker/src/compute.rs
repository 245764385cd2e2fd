//! The two local reductions a worker performs in a round.

use ndarray::{Array1, ArrayView1, ArrayView2, Zip};

/// Forward step, `epsilon[r] = sum_c R[r][c] * M[c] + background` for every row of the block.
///
/// # Arguments
/// * `rows` - The worker's row block of the operator, `(count, NUMCOLS)`.
/// * `model` - The full model vector, `NUMCOLS` long.
/// * `background` - A value added to every entry, zero for none.
///
/// # Returns
/// The worker's slice of the forward projection.
pub fn forward(rows: ArrayView2<'_, f64>, model: ArrayView1<'_, f64>, background: f64) -> Array1<f64> {
    let mut epsilon = rows.dot(&model);
    if background != 0. {
        epsilon += background;
    }

    epsilon
}

/// Adjoint step, `C[c] = sum_r R[r][c] * d[r] / epsilon[r]` for every column of the block.
///
/// Divides exactly as written, a zero in `epsilon` yields non finite entries.
///
/// # Arguments
/// * `cols` - The worker's column block of the operator, `(NUMROWS, count)`.
/// * `epsilon` - The complete forward projection, `NUMROWS` long.
/// * `counts` - The observed counts `d`, `NUMROWS` long, `None` weights every row by one.
///
/// # Returns
/// The worker's slice of the correction vector.
pub fn adjoint(
    cols: ArrayView2<'_, f64>,
    epsilon: ArrayView1<'_, f64>,
    counts: Option<ArrayView1<'_, f64>>,
) -> Array1<f64> {
    let ratio = match counts {
        Some(counts) => &counts / &epsilon,
        None => epsilon.mapv(f64::recip),
    };

    let mut correction = Array1::zeros(cols.ncols());
    Zip::from(&mut correction)
        .and(cols.columns())
        .par_for_each(|c, column| *c = column.dot(&ratio));

    correction
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array, s};

    use super::*;

    #[test]
    fn forward_on_diagonal() {
        let r = Array2::from_diag(&array![2., 2., 2., 2.]);
        let m = array![1., 2., 3., 4.];

        let eps = forward(r.slice(s![2..4, ..]), m.view(), 0.);
        assert_eq!(eps, array![6., 8.]);
    }

    #[test]
    fn forward_adds_background() {
        let r = Array2::from_diag(&array![2., 2.]);
        let m = array![1., 2.];

        let eps = forward(r.view(), m.view(), 0.5);
        assert_eq!(eps, array![2.5, 4.5]);
    }

    #[test]
    fn adjoint_on_diagonal() {
        let r = Array2::from_diag(&array![2., 2., 2., 2.]);
        let eps = array![2., 4., 6., 8.];

        let c = adjoint(r.slice(s![.., 0..2]), eps.view(), None);
        assert_eq!(c, array![1., 0.5]);
    }

    #[test]
    fn adjoint_reads_every_row() {
        let r = Array2::from_elem((3, 1), 1.);
        let eps = array![1., 2., 4.];

        let c = adjoint(r.view(), eps.view(), None);
        assert_eq!(c, array![1.75]);
    }

    #[test]
    fn adjoint_weights_rows_by_counts() {
        let r = Array2::from_elem((3, 2), 1.);
        let eps = array![1., 2., 4.];
        let d = array![2., 0., 8.];

        let c = adjoint(r.view(), eps.view(), Some(d.view()));
        assert_eq!(c, array![4., 4.]);
    }

    #[test]
    fn adjoint_zero_epsilon_is_non_finite() {
        let r = array![[1., 0.], [0., 0.]];
        let eps = array![1., 0.];

        let c = adjoint(r.view(), eps.view(), None);
        assert!(c.iter().all(|x| !x.is_finite()));
    }

    #[test]
    fn empty_blocks() {
        let r = Array2::<f64>::zeros((0, 3));
        assert!(forward(r.view(), array![1., 2., 3.].view(), 0.).is_empty());

        let r = Array2::<f64>::zeros((3, 0));
        assert!(adjoint(r.view(), array![1., 2., 3.].view(), None).is_empty());
    }
}
