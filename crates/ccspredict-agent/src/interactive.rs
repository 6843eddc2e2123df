//! Line-oriented prediction prompt.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use ccspredict_common::CcsError;

use crate::service::PredictionService;

const BANNER: &str = "Enter SMILES or InChI to predict CCS (or 'exit' to quit):";
const INVALID_INPUT: &str = "Invalid input. Please enter a valid SMILES or InChI.";

/// Predict every non-empty line read from `reader` until EOF or `exit`.
pub async fn run_prompt<R, W>(service: &PredictionService, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    writer.write_all(format!("{BANNER}\n").as_bytes()).await?;

    loop {
        writer.write_all(b"> ").await?;
        writer.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            break;
        }

        let out = answer(service, input).await;
        writer.write_all(out.as_bytes()).await?;
    }

    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Format the predictions for one input, one line per model.
pub async fn answer(service: &PredictionService, input: &str) -> String {
    match service.predict(input).await {
        Ok(predictions) => predictions
            .iter()
            .map(|p| format!("Predicted CCS ({}): {:.2} {}\n", p.model, p.value, p.unit))
            .collect(),
        Err(CcsError::InvalidStructure(reason)) => {
            debug!(%reason, "Rejected input");
            format!("{INVALID_INPUT}\n")
        }
        Err(e) => format!("Prediction failed: {e}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::service;

    async fn session(input: &str) -> String {
        let service = service();
        let mut out = Vec::new();
        run_prompt(&service, input.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_prompt_predicts_each_line() {
        let out = session("OCC\n\nInChI=1S/C2H6O/c1-2-3/h3H,2H2,1H3\n").await;
        assert!(out.starts_with(BANNER));
        assert_eq!(out.matches("Predicted CCS (gradient_boosting): 120.00 Å²").count(), 2);
        assert_eq!(out.matches("Predicted CCS (random_forest): 120.00 Å²").count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_input_keeps_prompting() {
        let out = session("C1CC(\nOCC\n").await;
        assert!(out.contains(INVALID_INPUT));
        assert!(out.contains("Predicted CCS (gradient_boosting)"));
    }

    #[tokio::test]
    async fn test_exit_stops_reading() {
        let out = session("EXIT\nOCC\n").await;
        assert!(!out.contains("Predicted CCS"));
    }
}
