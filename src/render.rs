use crate::charts::{ChartConfig, ChartType};
use crate::project::ChartProjection;
use plotters::prelude::*;
use std::io::Cursor;

/// Server-side PNG renderer for saved charts.
///
/// Owns its output dimensions; each render allocates a fresh pixel buffer
/// and constructs a bitmap backend over it, so nothing is shared between
/// renders and no global drawing handle exists.
#[derive(Debug, Clone, Copy)]
pub struct ChartRenderer {
    width: u32,
    height: u32,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        ChartRenderer::new(800, 600)
    }
}

impl ChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        ChartRenderer { width, height }
    }

    /// Draw the projection according to the chart configuration and return
    /// the encoded PNG bytes.
    ///
    /// Y values are plotted against their index; the categorical X values
    /// do not drive coordinates (they can be shorter or longer than Y when
    /// coercion dropped entries).
    pub fn render(
        &self,
        config: &ChartConfig,
        projection: &ChartProjection,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let mut buffer = vec![0u8; (self.width * self.height * 3) as usize];

        {
            let root = BitMapBackend::with_buffer(&mut buffer, (self.width, self.height))
                .into_drawing_area();

            let (background, foreground, accent) = theme_colors(&config.theme);
            root.fill(&background)?;

            let points: Vec<(f64, f64)> = series_points(projection);
            let n = points.len() as f64;

            let max_y = points.iter().map(|(_, y)| *y).fold(f64::MIN, f64::max);
            let min_y = points.iter().map(|(_, y)| *y).fold(f64::MAX, f64::min);
            let min_y = min_y.min(0.0);
            let pad = ((max_y - min_y) * 0.05).max(1.0);

            let mut builder = ChartBuilder::on(&root);
            builder
                .margin(10)
                .x_label_area_size(30)
                .y_label_area_size(40);
            if !config.title.is_empty() {
                builder.caption(&config.title, ("sans-serif", 30).into_font().color(&foreground));
            }

            let mut chart =
                builder.build_cartesian_2d(-0.5f64..n - 0.5, min_y..max_y + pad)?;

            if config.show_grid {
                chart
                    .configure_mesh()
                    .x_desc(&config.x_axis)
                    .y_desc(&config.y_axis)
                    .label_style(("sans-serif", 14).into_font().color(&foreground))
                    .axis_style(foreground)
                    .draw()?;
            }

            let series_label = config.y_axis.clone();
            let annotation = match config.chart_type {
                ChartType::Line => chart.draw_series(LineSeries::new(
                    points.iter().copied(),
                    accent.stroke_width(2),
                ))?,
                ChartType::Bar => chart.draw_series(points.iter().map(|&(x, y)| {
                    Rectangle::new([(x - 0.35, 0.0), (x + 0.35, y)], accent.filled())
                }))?,
                ChartType::Scatter => chart.draw_series(
                    points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 4, accent.filled())),
                )?,
                ChartType::Area => chart.draw_series(
                    AreaSeries::new(points.iter().copied(), 0.0, accent.mix(0.25))
                        .border_style(accent.stroke_width(2)),
                )?,
            };

            if config.show_legend {
                annotation
                    .label(series_label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], accent));

                chart
                    .configure_series_labels()
                    .background_style(background.mix(0.8))
                    .border_style(foreground)
                    .label_font(("sans-serif", 14).into_font().color(&foreground))
                    .draw()?;
            }

            root.present()?;
        }

        encode_png(self.width, self.height, buffer)
    }
}

/// Background, text and series colors for a theme name. Unknown themes
/// fall back to the light palette.
fn theme_colors(theme: &str) -> (RGBColor, RGBColor, RGBColor) {
    match theme {
        "dark" => (RGBColor(30, 32, 38), RGBColor(230, 230, 230), RGBColor(102, 178, 255)),
        _ => (WHITE, RGBColor(40, 40, 40), RGBColor(54, 98, 227)),
    }
}

/// Index/value pairs for the Y series.
fn series_points(projection: &ChartProjection) -> Vec<(f64, f64)> {
    projection
        .y_values
        .iter()
        .enumerate()
        .map(|(i, &y)| (i as f64, y))
        .collect()
}

/// Encode an RGB buffer as PNG.
fn encode_png(
    width: u32,
    height: u32,
    buffer: Vec<u8>,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let img = image::RgbImage::from_raw(width, height, buffer)
        .ok_or("pixel buffer does not match the requested dimensions")?;

    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)?;

    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::charts::ChartConfig;

    /// Config with every text element disabled so the render path does not
    /// depend on system fonts.
    fn bare_config(chart_type: ChartType) -> ChartConfig {
        ChartConfig {
            id: "test".to_string(),
            source: "sales.xlsx".to_string(),
            chart_type,
            x_axis: "Region".to_string(),
            y_axis: "Sales".to_string(),
            z_axis: None,
            title: String::new(),
            theme: "light".to_string(),
            show_legend: false,
            show_grid: false,
        }
    }

    fn sample_projection() -> ChartProjection {
        ChartProjection {
            x_values: vec![
                CellValue::Text("East".to_string()),
                CellValue::Text("West".to_string()),
                CellValue::Text("North".to_string()),
            ],
            y_values: vec![100.0, 40.0, 250.0],
            z_values: None,
        }
    }

    #[test]
    fn renders_a_png_for_every_chart_type() {
        let renderer = ChartRenderer::new(320, 240);
        let projection = sample_projection();

        for chart_type in [
            ChartType::Line,
            ChartType::Bar,
            ChartType::Scatter,
            ChartType::Area,
        ] {
            let png = renderer
                .render(&bare_config(chart_type), &projection)
                .expect("render should succeed");
            // PNG signature
            assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
        }
    }

    #[test]
    fn dark_theme_uses_a_dark_background() {
        let (background, _, _) = theme_colors("dark");
        assert!(background.0 < 80 && background.1 < 80 && background.2 < 80);

        let (background, _, _) = theme_colors("anything-else");
        assert_eq!(background, WHITE);
    }
}
