//! Minimal server-side HTML building for the dashboard pages. Charts are
//! shipped as ECharts option JSON and drawn client-side.

use std::fmt::Write;

use anyhow::Result;
use axum::response::Html;
use charming::Chart;
use market::{Locale, chart::to_option_json};

use super::Tab;

const ECHARTS_CDN: &str = "https://cdn.jsdelivr.net/npm/echarts@5/dist/echarts.min.js";

const STYLE: &str = "\
body{margin:0;font-family:system-ui,sans-serif;background:#0b0c17;color:#e6e6e6}\
header{padding:16px 24px;border-bottom:1px solid #2d2f45;display:flex;justify-content:space-between;align-items:center}\
nav a,.langs a{color:#a0a0a0;margin-right:16px;text-decoration:none}\
nav a.active,.langs a.active{color:#fff;font-weight:600}\
main{padding:16px 24px}\
.cards{display:flex;flex-wrap:wrap;gap:12px;margin:12px 0}\
.card{background:#15172a;border:1px solid #2d2f45;border-radius:6px;padding:12px 16px;min-width:160px}\
.card .label{color:#a0a0a0;font-size:12px}.card .value{font-size:22px}\
.up{color:#00d084}.down{color:#ff4d4f}\
.chart{width:100%;height:420px;margin:12px 0}\
.banner{padding:10px 14px;border-radius:6px;margin:8px 0}\
.banner.info{background:#10254a}.banner.warning{background:#4a3b10}\
.banner.error{background:#4a1014}.banner.success{background:#103f2a}\
table{border-collapse:collapse;margin:12px 0}td,th{border:1px solid #2d2f45;padding:6px 12px;text-align:left}\
form{display:flex;flex-wrap:wrap;gap:12px;align-items:end;margin:12px 0}\
label{display:flex;flex-direction:column;font-size:12px;color:#a0a0a0}";

#[derive(Debug, Clone, Copy)]
pub enum Banner {
    Info,
    Success,
    Warning,
    Error,
}

impl Banner {
    fn class(&self) -> &'static str {
        match self {
            Banner::Info => "info",
            Banner::Success => "success",
            Banner::Warning => "warning",
            Banner::Error => "error",
        }
    }
}

pub struct Page {
    locale: Locale,
    tab: Tab,
    body: String,
    charts: Vec<(String, String)>,
}

impl Page {
    pub fn new(locale: Locale, tab: Tab) -> Self {
        Self {
            locale,
            tab,
            body: String::new(),
            charts: Vec::new(),
        }
    }

    pub fn t(&self, key: &'static str) -> &'static str {
        self.locale.t(key)
    }

    pub fn push(&mut self, html: impl AsRef<str>) {
        self.body.push_str(html.as_ref());
    }

    pub fn heading(&mut self, text: &str) {
        let _ = write!(self.body, "<h2>{}</h2>", escape(text));
    }

    pub fn subheading(&mut self, text: &str) {
        let _ = write!(self.body, "<h3>{}</h3>", escape(text));
    }

    pub fn paragraph(&mut self, text: &str) {
        let _ = write!(self.body, "<p>{}</p>", escape(text));
    }

    pub fn banner(&mut self, kind: Banner, text: &str) {
        let _ = write!(
            self.body,
            r#"<div class="banner {}">{}</div>"#,
            kind.class(),
            escape(text)
        );
    }

    /// Placeholder div plus the option JSON that fills it on load.
    pub fn chart(&mut self, chart: &Chart) -> Result<()> {
        let id = format!("chart-{}", self.charts.len());
        let _ = write!(self.body, r#"<div class="chart" id="{id}"></div>"#);
        self.charts.push((id, to_option_json(chart)?));
        Ok(())
    }

    pub fn render(self) -> Html<String> {
        let mut out = String::with_capacity(self.body.len() + 4096);
        let title = escape(self.t("page_title"));
        let _ = write!(
            out,
            r#"<!DOCTYPE html><html lang="{lang}"><head><meta charset="utf-8"><title>{title}</title><style>{STYLE}</style><script src="{ECHARTS_CDN}"></script></head><body>"#,
            lang = self.locale.code(),
        );

        let _ = write!(out, "<header><h1>{}</h1><div class=\"langs\">", escape(self.t("main_header")));
        for locale in Locale::ALL {
            let _ = write!(
                out,
                r#"<a class="{}" href="{}?lang={}">{}</a>"#,
                if locale == self.locale { "active" } else { "" },
                self.tab.path(),
                locale.code(),
                locale.name()
            );
        }
        out.push_str("</div></header><nav style=\"padding:8px 24px\">");
        for tab in Tab::ALL {
            let _ = write!(
                out,
                r#"<a class="{}" href="{}?lang={}">{}</a>"#,
                if tab == self.tab { "active" } else { "" },
                tab.path(),
                self.locale.code(),
                escape(self.locale.t(tab.label_key()))
            );
        }
        out.push_str("</nav><main>");
        out.push_str(&self.body);
        out.push_str("</main>");

        if !self.charts.is_empty() {
            out.push_str("<script>");
            for (id, option) in &self.charts {
                let _ = write!(
                    out,
                    "echarts.init(document.getElementById('{id}'),'dark').setOption({});",
                    option.replace('<', "\\u003c")
                );
            }
            out.push_str("</script>");
        }
        out.push_str("</body></html>");
        Html(out)
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `<div class="card">` with an optional signed delta underneath.
pub fn metric_card(label: &str, value: &str, delta: Option<f64>) -> String {
    let delta = delta
        .map(|d| {
            let class = if d >= 0.0 { "up" } else { "down" };
            format!(r#"<div class="{class}">{}</div>"#, signed_pct(d))
        })
        .unwrap_or_default();
    format!(
        r#"<div class="card"><div class="label">{}</div><div class="value">{}</div>{delta}</div>"#,
        escape(label),
        escape(value)
    )
}

pub fn cards(cards: &[String]) -> String {
    format!(r#"<div class="cards">{}</div>"#, cards.concat())
}

pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::from("<table><thead><tr>");
    for h in headers {
        let _ = write!(out, "<th>{}</th>", escape(h));
    }
    out.push_str("</tr></thead><tbody>");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", escape(cell));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

/// `<select>` with `value` pre-selected.
pub fn select(name: &str, label: &str, options: &[(&str, &str)], value: &str) -> String {
    let mut out = format!(r#"<label>{}<select name="{name}">"#, escape(label));
    for (v, text) in options {
        let _ = write!(
            out,
            r#"<option value="{}"{}>{}</option>"#,
            escape(v),
            if *v == value { " selected" } else { "" },
            escape(text)
        );
    }
    out.push_str("</select></label>");
    out
}

pub fn input(name: &str, label: &str, kind: &str, value: &str) -> String {
    format!(
        r#"<label>{}<input type="{kind}" name="{name}" value="{}"></label>"#,
        escape(label),
        escape(value)
    )
}

/// GET form that keeps the current language.
pub fn form(action: &str, locale: Locale, fields: &[String], submit: &str) -> String {
    format!(
        r#"<form method="get" action="{action}"><input type="hidden" name="lang" value="{}">{}<button type="submit" name="run" value="1">{}</button></form>"#,
        locale.code(),
        fields.concat(),
        escape(submit)
    )
}

pub fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

pub fn signed_pct(v: f64) -> String {
    format!("{:+.2}%", v * 100.0)
}

pub fn money(v: f64) -> String {
    format!("${}", thousands(v, 2))
}

/// Fixed decimals with `,` between thousands groups.
pub fn thousands(v: f64, decimals: usize) -> String {
    let raw = format!("{:.*}", decimals, v.abs());
    let (int, frac) = raw.split_once('.').unwrap_or((raw.as_str(), ""));

    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if v < 0.0 && raw.chars().any(|c| c != '0' && c != '.') { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(thousands(1234567.891, 2), "1,234,567.89");
        assert_eq!(thousands(999.0, 0), "999");
        assert_eq!(thousands(-1000.0, 0), "-1,000");
        assert_eq!(thousands(-0.001, 2), "0.00");
        assert_eq!(money(100000.0), "$100,000.00");
    }

    #[test]
    fn formats_percentages() {
        assert_eq!(pct(0.1234), "12.34%");
        assert_eq!(signed_pct(0.05), "+5.00%");
        assert_eq!(signed_pct(-0.02), "-2.00%");
    }

    #[test]
    fn metric_card_colors_delta() {
        let up = metric_card("Sharpe", "1.20", Some(0.1));
        assert!(up.contains(r#"class="up""#));
        let down = metric_card("DD", "-5%", Some(-0.02));
        assert!(down.contains(r#"class="down""#));
        assert!(!metric_card("x", "y", None).contains("up"));
    }

    #[test]
    fn select_marks_current_value() {
        let html = select("period", "Period", &[("1mo", "1mo"), ("1y", "1y")], "1y");
        assert!(html.contains(r#"<option value="1y" selected>"#));
        assert!(!html.contains(r#"<option value="1mo" selected>"#));
    }
}
