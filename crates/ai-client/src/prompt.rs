//! Prompt assembly for the narrative provider. Price history is
//! serialized as XML-ish records, which the model parses more reliably
//! than prose tables.

use analysis_core::{AnalysisKind, JointEntry, PricePoint};

use crate::joint::{JSON_DATA_END, JSON_DATA_START};

/// Shared formatting rules appended to every per-symbol prompt.
const FORMAT_INSTRUCTIONS: &str = "\
---
### CRITICAL FORMATTING INSTRUCTIONS:
1. Rich **Markdown** with pertinent section headers.
2. Professional, analytical tone.
3. DO NOT ADD WARNINGS OR DISCLAIMERS (e.g. \"this is not a recommendation...\"). A standard disclaimer already exists in the system.
4. No empty introductions. Start directly at the title.
";

fn history_block(series: &[PricePoint]) -> String {
    let records: String = series
        .iter()
        .map(|p| {
            let dividend = match p.dividend {
                Some(d) => format!("\n        <dividend>{d}</dividend>"),
                None => String::new(),
            };
            format!(
                "\n    <record>\n        <date>{}</date>\n        <close>{}</close>{}\n    </record>",
                p.date.format("%Y-%m-%d"),
                p.close,
                dividend
            )
        })
        .collect();

    format!("<historical_data>{records}\n</historical_data>")
}

/// Build the report prompt for one symbol and analysis flavor.
pub fn narrative_prompt(symbol: &str, kind: AnalysisKind, series: &[PricePoint]) -> String {
    let base_context = format!(
        "Act as a senior certified financial analyst and portfolio manager \
         specialized in the Brazilian market (B3).\n\
         Your task is to produce an analysis report for {symbol} based on the data below:\n\n{}\n",
        history_block(series)
    );

    let body = match kind {
        AnalysisKind::Full => format!(
            "{base_context}\n\
             Produce a **COMPLETE STRATEGIC ANALYSIS**.\n\
             Required structure:\n\
             - # Strategic Analysis: {symbol}\n\
             - ## Current Picture: executive summary of price and variation.\n\
             - ## Trend Analysis (2 Years): comment on support, resistance and patterns.\n\
             - ## Dividends & Income: what the distribution history says.\n\
             - ## Verdict & Outlook: scale [STRONG BUY to STRONG SELL].\n\
             - ## Risks: 2-3 points of attention.\n"
        ),
        AnalysisKind::Technical => format!(
            "{base_context}\n\
             Produce a **DETAILED TECHNICAL ANALYSIS**. Focus exclusively on:\n\
             - # Technical Analysis: {symbol}\n\
             - ## Price Action: the variations over the last 2 years.\n\
             - ## Support and Resistance: critical price levels.\n\
             - ## Trend: is it up, down or sideways?\n\
             - ## Entry Timing: the best technical moment to act.\n\
             Use technical terminology (moving averages, RSI where deducible, candlestick patterns).\n"
        ),
        AnalysisKind::Fundamental => format!(
            "{base_context}\n\
             Produce a **FUNDAMENTAL ANALYSIS & CONTEXT**. Focus on:\n\
             - # Fundamental Analysis: {symbol}\n\
             - ## About the Company: profile and sector.\n\
             - ## Price Assessment: does the current level look fair against the history?\n\
             - ## Dividends: the distribution record in the data.\n\
             - ## Long-Term Outlook: is the asset resilient?\n"
        ),
        AnalysisKind::Dividends => format!(
            "{base_context}\n\
             Produce a **DIVIDEND REPORT (YIELD FOCUS)**. Focus on:\n\
             - # Dividend Report: {symbol}\n\
             - ## Payment History: regularity and amounts.\n\
             - ## Dividend Yield: estimate against the latest price.\n\
             - ## Sustainability: does the current price allow a good forward yield?\n\
             - ## Conclusion: is this a reliable income holding?\n"
        ),
        AnalysisKind::Sentiment => format!(
            "{base_context}\n\
             Produce a **SENTIMENT & NEWSFLOW REPORT**. Focus on:\n\
             - # Market Thermometer: {symbol}\n\
             - ## Price Reaction: how has the price behaved recently?\n\
             - ## Market Mood: does the tape suggest panic, euphoria or caution?\n\
             - ## Short-Term Alert: what to expect over the coming days.\n"
        ),
    };

    format!("{body}{FORMAT_INSTRUCTIONS}")
}

/// Build the single joint-analysis prompt over every completed report,
/// instructing the model to append the sentinel-delimited ranking block.
pub fn joint_prompt(entries: &[JointEntry]) -> String {
    let reports: String = entries
        .iter()
        .map(|e| format!("\n<report symbol=\"{}\">\n{}\n</report>\n", e.symbol, e.content))
        .collect();

    format!(
        "Act as the chief strategist of an investment portfolio on the Brazilian \
         market (B3). Below are individual analysis reports for each asset in the \
         portfolio:\n{reports}\n\
         Produce a **CONSOLIDATED PORTFOLIO STRATEGY**:\n\
         - # Portfolio Strategy\n\
         - ## Overview: how the assets complement or overlap each other.\n\
         - ## Highlights: the strongest and weakest holdings right now.\n\
         - ## Suggested Moves: rebalancing ideas, in plain language.\n\n\
         After the narrative, append a machine-readable ranking of every asset, \
         delimited EXACTLY as follows (valid JSON between the markers, nothing else):\n\
         {JSON_DATA_START}\n\
         [{{\"symbol\": \"TICKER\", \"signal\": \"BUY | HOLD | SELL\", \"score\": 0-10}}]\n\
         {JSON_DATA_END}\n\
         {FORMAT_INSTRUCTIONS}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn sample_series() -> Vec<PricePoint> {
        vec![
            PricePoint {
                date: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
                close: dec!(31.20),
                dividend: None,
            },
            PricePoint {
                date: Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
                close: dec!(31.55),
                dividend: Some(dec!(0.42)),
            },
        ]
    }

    #[test]
    fn narrative_prompt_carries_symbol_and_history() {
        let prompt = narrative_prompt("PETR4", AnalysisKind::Full, &sample_series());

        assert!(prompt.contains("PETR4"));
        assert!(prompt.contains("<date>2024-01-02</date>"));
        assert!(prompt.contains("<close>31.55</close>"));
        // Dividend tag only on the day that paid one.
        assert_eq!(prompt.matches("<dividend>").count(), 1);
        assert!(prompt.contains("CRITICAL FORMATTING INSTRUCTIONS"));
    }

    #[test]
    fn each_kind_gets_its_own_template() {
        let series = sample_series();
        let technical = narrative_prompt("VALE3", AnalysisKind::Technical, &series);
        let dividends = narrative_prompt("VALE3", AnalysisKind::Dividends, &series);

        assert!(technical.contains("# Technical Analysis: VALE3"));
        assert!(dividends.contains("# Dividend Report: VALE3"));
    }

    #[test]
    fn joint_prompt_lists_every_report_and_the_sentinels() {
        let entries = vec![
            JointEntry {
                symbol: "PETR4".to_string(),
                content: "Report A".to_string(),
            },
            JointEntry {
                symbol: "VALE3".to_string(),
                content: "Report B".to_string(),
            },
        ];

        let prompt = joint_prompt(&entries);
        assert!(prompt.contains("<report symbol=\"PETR4\">"));
        assert!(prompt.contains("<report symbol=\"VALE3\">"));
        assert!(prompt.contains(JSON_DATA_START));
        assert!(prompt.contains(JSON_DATA_END));
    }
}
