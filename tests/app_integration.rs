use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::fs;
use tracing::{error, info};

mod test_utils {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const SPREADSHEET_ID: &str = "sheet-123";

    pub fn quote_response(rates: &[f64]) -> String {
        let payment_options: serde_json::Map<String, serde_json::Value> = rates
            .iter()
            .enumerate()
            .map(|(i, rate)| {
                (
                    format!("option{i}"),
                    json!({ "name": format!("Option {i}"), "quote": { "rate": rate } }),
                )
            })
            .collect();
        json!({
            "deliveryOptions": {
                "standard": { "name": "Standard", "paymentOptions": payment_options }
            }
        })
        .to_string()
    }

    pub async fn mount_token_endpoint(mock_server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"access_token": "ya29.mock", "expires_in": 3599, "token_type": "Bearer"}"#,
            ))
            .mount(mock_server)
            .await;
    }

    pub async fn mount_quote(mock_server: &MockServer, to_currency: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path("/api/transfers/quote"))
            .and(query_param("toCurrencyCode", to_currency))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(mock_server)
            .await;
    }

    pub async fn mount_sheets(mock_server: &MockServer, input_rows: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/v4/spreadsheets/{SPREADSHEET_ID}/values/Base!A2:G"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                json!({ "range": "Base!A2:G1000", "majorDimension": "ROWS", "values": input_rows })
                    .to_string(),
            ))
            .mount(mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/v4/spreadsheets/{SPREADSHEET_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"sheets": [
                    {"properties": {"sheetId": 0, "title": "Base"}},
                    {"properties": {"sheetId": 99, "title": "results"}}
                ]}"#,
            ))
            .mount(mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("/v4/spreadsheets/{SPREADSHEET_ID}:batchUpdate")))
            .and(body_string_contains("deleteSheet"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("/v4/spreadsheets/{SPREADSHEET_ID}:batchUpdate")))
            .and(body_string_contains("addSheet"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path(format!(
                "/v4/spreadsheets/{SPREADSHEET_ID}/values/'results'!A1"
            )))
            .and(query_param("valueInputOption", "RAW"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(mock_server)
            .await;
    }

    /// Writes a service-account key and a config pointing every service at `base_url`.
    pub fn write_config(dir: &std::path::Path, base_url: &str) -> std::path::PathBuf {
        let credentials_path = dir.join("service_account.json");
        let credentials = json!({
            "type": "service_account",
            "client_email": "sync@rates.iam.gserviceaccount.com",
            "private_key_id": "test-key",
            "private_key": include_str!("fixtures/test_private_key.pem"),
            "token_uri": format!("{base_url}/token"),
        });
        std::fs::write(&credentials_path, credentials.to_string())
            .expect("Failed to write credentials");

        let config_path = dir.join("config.yaml");
        let config = format!(
            r#"
spreadsheet_id: "{SPREADSHEET_ID}"
credentials_path: "{}"
braze_api_key: "braze-test-key"
quote:
  base_url: "{base_url}"
sheets:
  base_url: "{base_url}"
"#,
            credentials_path.display()
        );
        std::fs::write(&config_path, config).expect("Failed to write config file");
        config_path
    }
}

fn input_row(residence: &str, hub: &str, to_country: &str, to_currency: &str) -> Value {
    json!(["", residence, hub, to_country, "GBP", to_currency, ""])
}

fn amount() -> Decimal {
    "101.0".parse().expect("valid amount")
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount_token_endpoint(&mock_server).await;
    test_utils::mount_quote(
        &mock_server,
        "PLN",
        200,
        &test_utils::quote_response(&[3.1, 3.25, 3.25, 2.9]),
    )
    .await;
    test_utils::mount_quote(
        &mock_server,
        "EUR",
        200,
        &test_utils::quote_response(&[1.1612, 1.15]),
    )
    .await;
    test_utils::mount_sheets(
        &mock_server,
        json!([
            input_row("GB", "EU", "PL", "PLN"),
            ["", "GB", "EU"],
            input_row("GB", "UK", "DE", "EUR"),
            // Sheets drops trailing blank cells, so an empty column G leaves six cells.
            ["", "GB", "FR", "FR", "GBP", "EUR"],
        ]),
    )
    .await;

    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = test_utils::write_config(temp_dir.path(), &mock_server.uri());

    let result = transfer_rates::run_command(
        transfer_rates::AppCommand::Calculate {
            amount: Some(amount()),
        },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Main function failed with: {:?}",
        result.err()
    );

    let requests = mock_server.received_requests().await.unwrap();
    let quote_calls = requests
        .iter()
        .filter(|r| r.url.path() == "/api/transfers/quote")
        .count();
    assert_eq!(quote_calls, 2);

    let batch_updates: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path().ends_with(":batchUpdate"))
        .map(|r| String::from_utf8_lossy(&r.body).to_string())
        .collect();
    assert_eq!(batch_updates.len(), 2);
    assert!(batch_updates[0].contains(r#""sheetId":99"#));
    assert!(batch_updates[1].contains("addSheet"));

    let write = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .expect("results were written");
    let body: Value = serde_json::from_slice(&write.body).unwrap();
    info!(?body, "Written values");
    assert_eq!(
        body["values"],
        json!([
            [
                "id",
                "country_of_residence",
                "blended_hub",
                "to_country_code",
                "from_currency_code",
                "to_currency_code",
                "transfer_rate"
            ],
            ["GB-EU", "GB", "EU", "PL", "GBP", "PLN", 3.25],
            ["GB-UK", "GB", "UK", "DE", "GBP", "EUR", 1.16]
        ])
    );
}

#[test_log::test(tokio::test)]
async fn test_malformed_quote_keeps_row_without_rate() {
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount_token_endpoint(&mock_server).await;
    test_utils::mount_quote(&mock_server, "PLN", 200, r#"{"deliveryOptions": {}}"#).await;
    test_utils::mount_quote(
        &mock_server,
        "EUR",
        200,
        &test_utils::quote_response(&[1.17]),
    )
    .await;
    test_utils::mount_sheets(
        &mock_server,
        json!([
            input_row("GB", "EU", "PL", "PLN"),
            input_row("GB", "UK", "DE", "EUR"),
        ]),
    )
    .await;

    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = test_utils::write_config(temp_dir.path(), &mock_server.uri());

    transfer_rates::run_command(
        transfer_rates::AppCommand::Calculate {
            amount: Some(amount()),
        },
        Some(config_path.to_str().unwrap()),
    )
    .await
    .expect("run should succeed");

    let requests = mock_server.received_requests().await.unwrap();
    let write = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .expect("results were written");
    let body: Value = serde_json::from_slice(&write.body).unwrap();
    assert_eq!(body["values"][1][6], json!(""));
    assert_eq!(body["values"][2][6], json!(1.17));
}

#[test_log::test(tokio::test)]
async fn test_quote_api_failure_aborts_without_writing() {
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount_token_endpoint(&mock_server).await;
    test_utils::mount_quote(&mock_server, "PLN", 503, "").await;
    test_utils::mount_sheets(&mock_server, json!([input_row("GB", "EU", "PL", "PLN")])).await;

    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = test_utils::write_config(temp_dir.path(), &mock_server.uri());

    let result = transfer_rates::run_command(
        transfer_rates::AppCommand::Calculate {
            amount: Some(amount()),
        },
        Some(config_path.to_str().unwrap()),
    )
    .await;

    let err = result.expect_err("run should fail");
    assert!(format!("{err:#}").contains("HTTP error: 503"));

    let requests = mock_server.received_requests().await.unwrap();
    assert!(!requests.iter().any(|r| r.method.as_str() == "PUT"));
    assert!(!requests.iter().any(|r| r.url.path().ends_with(":batchUpdate")));
}

#[test_log::test(tokio::test)]
async fn test_missing_config_file_fails() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("missing.yaml");
    assert!(!config_path.exists());

    let result = transfer_rates::run_command(
        transfer_rates::AppCommand::Calculate {
            amount: Some(amount()),
        },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_err());
    let _ = fs::remove_dir_all(temp_dir.path());
}

#[test_log::test(tokio::test)]
#[ignore = "calls the live quote API"]
async fn test_real_transfergo_api() {
    use transfer_rates::core::quote::{CalculationBase, QuoteProvider, QuoteRequest};
    use transfer_rates::core::throttle::Throttle;
    use transfer_rates::providers::transfergo::TransferGoProvider;

    let provider = TransferGoProvider::new("https://my.transfergo.com", Throttle::per_second(7))
        .expect("Failed to build provider");
    let request = QuoteRequest {
        calculation_base: CalculationBase::SendAmount,
        amount: amount(),
        from_country_code: "GB".to_string(),
        to_country_code: "PL".to_string(),
        from_currency_code: "GBP".to_string(),
        to_currency_code: "PLN".to_string(),
    };
    info!(?request, "Fetching quote from TransferGo");

    match provider.fetch_quote(&request).await {
        Ok(outcome) => {
            info!(?outcome, "Received quote response");
            let rate = outcome.rate.expect("Quote should contain a rate");
            assert!(rate > Decimal::ZERO, "Rate should be positive");
        }
        Err(e) => {
            error!("Quote API request failed: {e}\n{e:?}");
            panic!("Quote API request failed: {e}");
        }
    }
}
