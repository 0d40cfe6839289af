/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }

    let mut result = Vec::with_capacity(n);
    let step = (end - start) / (n as f64 - 1.0);

    for i in 0..n {
        result.push(start + (i as f64) * step);
    }

    result
}

/// Cartesian grid of sample points, the last coordinate running fastest.
pub fn grid(axes: &[Vec<f64>]) -> Vec<Vec<f64>> {
    axes.iter().fold(vec![vec![]], |points, values| {
        points
            .iter()
            .flat_map(|p| {
                values.iter().map(move |&v| {
                    let mut point = p.clone();
                    point.push(v);
                    point
                })
            })
            .collect()
    })
}
