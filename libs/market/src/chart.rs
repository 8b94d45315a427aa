//! ECharts chart builders shared by the dashboard pages and the PNG endpoint.

use anyhow::{Error, ensure};
use charming::{
    Chart, ImageFormat, ImageRenderer,
    component::{Axis, Legend, Title},
    element::{
        AreaStyle, AxisLabel, AxisType, ItemStyle, LineStyle, SplitLine, Symbol, TextStyle,
        Tooltip, Trigger,
    },
    series::{Bar as BarSeries, Candlestick, Line},
};

use crate::indicators::rsi::{OVERBOUGHT, OVERSOLD};
use crate::models::{Bar, Point};

pub const WIDTH: u32 = 1200;
pub const HEIGHT: u32 = 600;

const BACKGROUND: &str = "#0b0c17";
const GRID: &str = "#2d2f45";
const LABEL: &str = "#a0a0a0";
const BULL: &str = "#00d084";
const BEAR: &str = "#ff4d4f";
const ACCENT: &str = "#0064FF";

fn base(title: impl Into<String>) -> Chart {
    Chart::new()
        .background_color(BACKGROUND)
        .title(
            Title::new()
                .text(title.into())
                .left("center")
                .top("2%")
                .text_style(TextStyle::new().color("#ffffff").font_size(14)),
        )
        .tooltip(Tooltip::new().trigger(Trigger::Axis))
}

fn category_axis(labels: Vec<String>) -> Axis {
    let interval = (labels.len() / 10).max(1) as f64 - 1.0;
    Axis::new()
        .type_(AxisType::Category)
        .data(labels)
        .axis_label(
            AxisLabel::new()
                .rotate(45)
                .interval(interval.max(0.0))
                .color(LABEL),
        )
        .split_line(SplitLine::new().line_style(LineStyle::new().color(GRID)))
}

fn value_axis() -> Axis {
    Axis::new()
        .type_(AxisType::Value)
        .scale(true)
        .axis_label(AxisLabel::new().color(LABEL))
        .split_line(SplitLine::new().line_style(LineStyle::new().color(GRID)))
}

fn dates(bars: &[Bar]) -> Vec<String> {
    bars.iter().map(Bar::date).collect()
}

fn point_dates(points: &[Point]) -> Vec<String> {
    points
        .iter()
        .map(|p| p.timestamp.format("%Y-%m-%d").to_string())
        .collect()
}

fn gaps(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

/// Candlesticks for OHLC bars. Price-only series (crypto) render as flat candles,
/// so those get a close line instead.
pub fn price_chart(symbol: &str, bars: &[Bar]) -> Chart {
    let last_price = bars.last().map(|b| b.close).unwrap_or(0.0);
    let flat = bars.iter().all(|b| b.high == b.low);

    let chart = base(format!("{} | ${:.2}", symbol.to_uppercase(), last_price))
        .x_axis(category_axis(dates(bars)))
        .y_axis(value_axis());

    if flat {
        return chart.series(
            Line::new()
                .name("Price")
                .data(bars.iter().map(|b| b.close).collect::<Vec<_>>())
                .symbol(Symbol::None)
                .line_style(LineStyle::new().width(2).color(BULL)),
        );
    }

    // ECharts candlestick order: open, close, low, high
    let candles: Vec<Vec<f64>> = bars
        .iter()
        .map(|b| vec![b.open, b.close, b.low, b.high])
        .collect();

    chart.series(Candlestick::new().name("OHLC").data(candles))
}

pub fn volume_chart(bars: &[Bar]) -> Chart {
    base("Trading Volume")
        .x_axis(category_axis(dates(bars)))
        .y_axis(value_axis())
        .series(
            BarSeries::new()
                .name("Volume")
                .data(bars.iter().map(|b| b.volume).collect::<Vec<_>>())
                .item_style(ItemStyle::new().color("rgba(0, 128, 255, 0.6)")),
        )
}

pub fn rsi_chart(bars: &[Bar], rsi: &[Option<f64>]) -> Chart {
    let n = bars.len();
    base("RSI (14)")
        .legend(Legend::new().top("8%"))
        .x_axis(category_axis(dates(bars)))
        .y_axis(value_axis())
        .series(
            Line::new()
                .name("RSI")
                .data(gaps(rsi))
                .symbol(Symbol::None)
                .line_style(LineStyle::new().width(2).color(ACCENT)),
        )
        .series(
            Line::new()
                .name("Overbought")
                .data(vec![OVERBOUGHT; n])
                .symbol(Symbol::None)
                .line_style(LineStyle::new().width(1).color(BEAR)),
        )
        .series(
            Line::new()
                .name("Oversold")
                .data(vec![OVERSOLD; n])
                .symbol(Symbol::None)
                .line_style(LineStyle::new().width(1).color(BULL)),
        )
}

pub fn equity_chart(equity: &[Point]) -> Chart {
    base("Portfolio Equity")
        .x_axis(category_axis(point_dates(equity)))
        .y_axis(value_axis())
        .series(
            Line::new()
                .name("Equity")
                .data(equity.iter().map(|p| p.value).collect::<Vec<_>>())
                .symbol(Symbol::None)
                .line_style(LineStyle::new().width(2).color(BULL)),
        )
}

pub fn drawdown_chart(drawdown: &[Point]) -> Chart {
    base("Drawdown (%)")
        .x_axis(category_axis(point_dates(drawdown)))
        .y_axis(value_axis())
        .series(
            Line::new()
                .name("Drawdown")
                .data(drawdown.iter().map(|p| p.value * 100.0).collect::<Vec<_>>())
                .symbol(Symbol::None)
                .area_style(AreaStyle::new().color("rgba(255, 77, 79, 0.3)"))
                .line_style(LineStyle::new().width(1).color(BEAR)),
        )
}

pub fn returns_histogram(returns: &[Point], bins: usize) -> Chart {
    let values: Vec<f64> = returns.iter().map(|p| p.value).collect();
    let (labels, counts) = histogram(&values, bins);

    base("Daily Returns")
        .x_axis(category_axis(labels))
        .y_axis(value_axis())
        .series(
            BarSeries::new()
                .name("Frequency")
                .data(counts.into_iter().map(|c| c as f64).collect::<Vec<_>>())
                .item_style(ItemStyle::new().color(ACCENT)),
        )
}

pub fn rolling_chart(title: &str, returns: &[Point], values: &[Option<f64>]) -> Chart {
    base(title.to_string())
        .x_axis(category_axis(point_dates(returns)))
        .y_axis(value_axis())
        .series(
            Line::new()
                .name(title.to_string())
                .data(gaps(values))
                .symbol(Symbol::None)
                .line_style(LineStyle::new().width(2).color(ACCENT)),
        )
}

/// Equal-width bins over `[min, max]`; labels are the bin midpoints in percent.
pub fn histogram(values: &[f64], bins: usize) -> (Vec<String>, Vec<usize>) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return (Vec::new(), Vec::new());
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = ((max - min) / bins as f64).max(f64::EPSILON);

    let mut counts = vec![0usize; bins];
    for v in finite {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let labels = (0..bins)
        .map(|i| format!("{:.2}%", (min + width * (i as f64 + 0.5)) * 100.0))
        .collect();

    (labels, counts)
}

/// ECharts option JSON for embedding in a page.
pub fn to_option_json(chart: &Chart) -> Result<String, Error> {
    Ok(serde_json::to_string(chart)?)
}

/// Server-side PNG render. Blocking; call from `spawn_blocking`.
pub fn render_png(chart: &Chart) -> Result<Vec<u8>, Error> {
    let mut renderer = ImageRenderer::new(WIDTH, HEIGHT);
    let png_bytes = renderer.render_format(ImageFormat::Png, chart)?;
    ensure!(!png_bytes.is_empty(), "renderer produced an empty image");
    Ok(png_bytes)
}
