//! HTML rendering for the form and result pages.

use crate::collector::{column_rows, Selections};
use crate::config::PageConfig;
use crate::error::PredictError;
use crate::schema::{FeatureSchema, FeatureSpec};
use crate::types::report::PredictionReport;
use std::fmt::Write;

const STYLE: &str = r#"
body { background-color: #ADD8E6; font-family: sans-serif; margin: 0 2rem; }
h1 { text-align: center; font-size: 32px; }
.layout { display: grid; grid-template-columns: 3fr 1fr; gap: 2rem; }
.row { display: grid; grid-template-columns: 1fr 1fr; gap: 1.5rem; margin-bottom: 0.75rem; }
label { display: block; font-weight: bold; font-size: 18px; text-align: center; margin-bottom: 5px; }
select { width: 100%; border: 2px solid black; border-radius: 5px; padding: 5px 10px; text-align: center; }
.banner { background: #fff3cd; border: 1px solid #8b6d00; padding: 0.75rem; margin: 1rem 0; }
.error { background: #f8d7da; border: 1px solid #8b0000; padding: 0.75rem; margin: 1rem 0; }
.score { font-size: 70px; font-weight: bold; color: #8B0000; text-align: center; }
.fallback { font-size: 14px; color: #5a0000; }
button { font-size: 18px; padding: 0.5rem 2rem; }
"#;

/// Everything one page render needs.
pub struct PageView<'a> {
    pub page: &'a PageConfig,
    pub schema: &'a FeatureSchema,
    pub selections: &'a Selections,
    pub load_failures: &'a [PredictError],
    pub report: Option<&'a PredictionReport>,
    pub error: Option<&'a PredictError>,
}

/// Escape text for HTML element and attribute content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

pub fn render_page(view: &PageView<'_>) -> String {
    let mut html = String::with_capacity(16 * 1024);
    let title = escape(&view.page.title);

    let _ = write!(
        html,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{title}</title><style>{STYLE}</style></head><body>\
         <h1>{title}</h1><hr><p>{intro}</p><hr>",
        intro = escape(&view.page.intro),
    );

    if !view.load_failures.is_empty() || view.schema.is_placeholder() {
        html.push_str("<div class=\"banner\"><strong>Running in degraded mode.</strong>");
        if view.schema.is_placeholder() {
            html.push_str(
                " No model could be loaded, so the questions below are placeholders and no \
                 similarity score can be computed.",
            );
        }
        html.push_str("<ul>");
        for failure in view.load_failures {
            let _ = write!(html, "<li>{}</li>", escape(&failure.to_string()));
        }
        html.push_str("</ul></div>");
    }

    if let Some(error) = view.error {
        let _ = write!(html, "<div class=\"error\">{}</div>", escape(&error.to_string()));
    }

    html.push_str("<form method=\"post\" action=\"/predict\"><div class=\"layout\"><section>");
    let _ = write!(html, "<h2>{}</h2>", escape(&view.page.prompt));

    let features = view.schema.features();
    for (left, right) in column_rows(features.len()) {
        html.push_str("<div class=\"row\">");
        render_control(&mut html, &features[left], view);
        match right {
            Some(right) => render_control(&mut html, &features[right], view),
            None => html.push_str("<div></div>"),
        }
        html.push_str("</div>");
    }

    html.push_str("</section><section><h2>Prediction</h2>");
    html.push_str("<button type=\"submit\">Predict</button>");
    if let Some(report) = view.report {
        render_report(&mut html, report);
    }
    html.push_str("</section></div></form></body></html>");
    html
}

fn render_control(html: &mut String, feature: &FeatureSpec, view: &PageView<'_>) {
    let selected = view.selections.selected(view.schema, &feature.name);
    let name = escape(&feature.name);

    let _ = write!(
        html,
        "<div><label for=\"{name}\">{label}</label><select id=\"{name}\" name=\"{name}\">",
        label = escape(&feature.label),
    );
    for value in feature.domain.values() {
        let marker = if Some(*value) == selected { " selected" } else { "" };
        let _ = write!(html, "<option value=\"{value}\"{marker}>{value}</option>");
    }
    html.push_str("</select></div>");
}

fn render_report(html: &mut String, report: &PredictionReport) {
    if report.results.is_empty() {
        html.push_str("<p>No model is available to compute a score.</p>");
        return;
    }

    html.push_str("<h3>Similarity Score (0-100):</h3>");
    for result in &report.results {
        let _ = write!(
            html,
            "<div class=\"result\"><h4>{label}</h4><div class=\"score\">{score}</div>",
            label = escape(&result.label),
            score = result.score,
        );
        if let Some(note) = &result.fallback {
            let _ = write!(
                html,
                "<p class=\"fallback\">Default score shown, the model could not be evaluated: {}</p>",
                escape(&note.message)
            );
        }
        html.push_str("</div>");
    }
}
