//! CRAFT-style text detection: a `[H, W, 2]` region+affinity heatmap,
//! thresholded and connected-component-labeled, scaled back to the
//! original image.

use std::collections::VecDeque;

use super::TextRegion;

struct Component {
    pixel_count: usize,
    region_score_sum: f32,
    min_row: usize,
    max_row: usize,
    min_col: usize,
    max_col: usize,
}

/// `heatmap` is `[height, width, 2]` flattened row-major (region, affinity
/// interleaved per pixel). The combined score per pixel is
/// `clip(region + affinity, 0, 1)`.
pub fn decode(
    heatmap: &[f32],
    height: usize,
    width: usize,
    scale: f32,
    orig_width: u32,
    orig_height: u32,
    low_text_threshold: f32,
    text_threshold: f32,
    min_component_area: usize,
) -> Vec<TextRegion> {
    let mut combined = vec![0.0f32; height * width];
    let mut region = vec![0.0f32; height * width];
    for i in 0..height * width {
        let r = heatmap[i * 2];
        let a = heatmap[i * 2 + 1];
        region[i] = r;
        combined[i] = (r + a).clamp(0.0, 1.0);
    }

    let mut labels = vec![0u32; height * width];
    let mut components: Vec<Component> = Vec::new();

    for start in 0..height * width {
        if labels[start] != 0 || combined[start] < low_text_threshold {
            continue;
        }

        let label = components.len() as u32 + 1;
        let mut queue = VecDeque::new();
        queue.push_back(start);
        labels[start] = label;

        let mut comp = Component {
            pixel_count: 0,
            region_score_sum: 0.0,
            min_row: height,
            max_row: 0,
            min_col: width,
            max_col: 0,
        };

        while let Some(idx) = queue.pop_front() {
            let row = idx / width;
            let col = idx % width;
            comp.pixel_count += 1;
            comp.region_score_sum += region[idx];
            comp.min_row = comp.min_row.min(row);
            comp.max_row = comp.max_row.max(row);
            comp.min_col = comp.min_col.min(col);
            comp.max_col = comp.max_col.max(col);

            let neighbors = [
                (row.checked_sub(1), Some(col)),
                (Some(row + 1).filter(|&r| r < height), Some(col)),
                (Some(row), col.checked_sub(1)),
                (Some(row), Some(col + 1).filter(|&c| c < width)),
            ];
            for (nr, nc) in neighbors {
                if let (Some(nr), Some(nc)) = (nr, nc) {
                    let n_idx = nr * width + nc;
                    if labels[n_idx] == 0 && combined[n_idx] >= low_text_threshold {
                        labels[n_idx] = label;
                        queue.push_back(n_idx);
                    }
                }
            }
        }

        components.push(comp);
    }

    let mut regions: Vec<TextRegion> = components
        .into_iter()
        .filter_map(|c| {
            if c.pixel_count < min_component_area {
                return None;
            }
            let mean_score = c.region_score_sum / c.pixel_count as f32;
            if mean_score < text_threshold {
                return None;
            }

            let to_orig_x = |v: f32| (v * 2.0 / scale).clamp(0.0, orig_width as f32);
            let to_orig_y = |v: f32| (v * 2.0 / scale).clamp(0.0, orig_height as f32);

            Some(TextRegion {
                box_xyxy: [
                    to_orig_x(c.min_col as f32),
                    to_orig_y(c.min_row as f32),
                    to_orig_x((c.max_col + 1) as f32),
                    to_orig_y((c.max_row + 1) as f32),
                ],
                confidence: mean_score,
            })
        })
        .collect();

    regions.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    regions
}
