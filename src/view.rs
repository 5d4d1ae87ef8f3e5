use plotly::{
    layout::{Axis, AxisType},
    Layout, Plot, Scatter,
};

use crate::{codec::Block, Time};

const MAX_DISPLAY_DATA_POINTS: usize = 1024;

/// Samples of one series across `blocks`, in block order.
pub fn series_span(blocks: &[Block], key: &str) -> (Vec<Time>, Vec<f64>) {
    let mut x = vec![];
    let mut y = vec![];
    for samples in blocks.iter().filter_map(|block| block.samples(key)) {
        for sample in samples {
            x.push(sample.time);
            y.push(sample.value);
        }
    }
    (x, y)
}

/// Keeps the last point of every `chunk_size` points.
fn reduce<T: Copy>(points: &[T], chunk_size: usize) -> Vec<T> {
    points
        .chunks(chunk_size.max(1))
        .filter_map(|chunk| chunk.last().copied())
        .collect()
}

pub async fn scatter_chart_html(
    blocks: &[Block],
    keys: impl Iterator<Item = impl AsRef<str>>,
    value_range: Option<(f64, f64)>,
    div_id: Option<&str>,
) -> String {
    let mut data_point_count = 0;
    let mut data_sets = vec![];
    for key in keys {
        let (x, y) = series_span(blocks, key.as_ref());
        if x.is_empty() {
            continue;
        }
        data_point_count += x.len();
        data_sets.push((key, x, y));
        tokio::task::yield_now().await;
    }
    let chunk_size = data_point_count.div_ceil(MAX_DISPLAY_DATA_POINTS);
    let mut plot = Plot::new();
    for (key, x, y) in data_sets {
        let trace = Scatter::new(reduce(&x, chunk_size), reduce(&y, chunk_size)).name(key.as_ref());
        plot.add_trace(trace);
        tokio::task::yield_now().await;
    }
    let y = Axis::default().title("value");
    let y = match value_range {
        Some(range) => y.range(vec![range.0, range.1]),
        None => y,
    };
    let layout = Layout::default()
        .x_axis(Axis::default().title("time").type_(AxisType::Date))
        .y_axis(y);
    plot.set_layout(layout);
    plot.to_inline_html(div_id)
}

#[cfg(test)]
mod tests {
    use crate::Sample;

    use super::*;

    fn block(mint: Time, n: u64) -> Block {
        let samples = (0..n)
            .map(|i| Sample {
                time: mint + i,
                value: i as f64,
            })
            .collect();
        Block {
            mint,
            maxt: mint + n - 1,
            series: vec![("cpu".into(), samples)],
        }
    }

    #[test]
    fn span_concatenates_blocks() {
        let blocks = [block(0, 3), block(3, 2)];
        let (x, y) = series_span(&blocks, "cpu");
        assert_eq!(x, [0, 1, 2, 3, 4]);
        assert_eq!(y, [0., 1., 2., 0., 1.]);
        assert!(series_span(&blocks, "mem").0.is_empty());
    }

    #[test]
    fn reduce_keeps_chunk_tails() {
        assert_eq!(reduce(&[1, 2, 3, 4, 5], 2), [2, 4, 5]);
        assert_eq!(reduce(&[1, 2], 0), [1, 2]);
    }

    #[tokio::test]
    async fn chart_names_series() {
        let blocks = [block(1_569_801_600_000, 4_000)];
        let html = scatter_chart_html(&blocks, ["cpu", "missing"].iter(), None, Some("chart")).await;
        assert!(html.contains("cpu"));
        assert!(html.contains("chart"));
    }
}
