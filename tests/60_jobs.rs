mod common;

use axum::http::StatusCode;
use common::{StaticBroker, StaticNavs, StaticQuotes, TestApp};
use portfolio_tracker_api::config::AppConfig;
use portfolio_tracker_api::jobs::Job;
use serde_json::json;

fn app() -> TestApp {
    TestApp::build(
        AppConfig::for_tests(),
        StaticQuotes([("INFY".to_string(), 120.0)].into_iter().collect()),
        StaticNavs([("Axis Bluechip Fund".to_string(), 55.0)].into_iter().collect()),
        StaticBroker::default(),
    )
}

#[tokio::test]
async fn price_jobs_update_what_the_portfolio_reports() {
    let app = app();
    let (token, _) = app.login_as("asha").await;

    for body in [
        json!({ "symbol": "INFY", "security_type": "STOCK", "quantity": 10, "price_per_unit": 100 }),
        json!({ "symbol": "TCS", "security_type": "STOCK", "quantity": 1, "price_per_unit": 3000 }),
        json!({
            "symbol": "AXISBLUE",
            "name": "Axis Bluechip Fund - Direct Plan Growth",
            "security_type": "MF",
            "quantity": 100,
            "price_per_unit": 50
        }),
    ] {
        let created = app.create_transaction(&token, body).await;
        assert_eq!(created.status, StatusCode::CREATED);
    }

    let context = app.state.job_context();

    let stocks = context.run(Job::StockPrices).await.expect("stock job");
    assert_eq!(stocks.total, 2);
    assert_eq!(stocks.updated, 1);
    assert_eq!(stocks.errors, 1);

    let navs = context.run(Job::MutualFundNav).await.expect("nav job");
    assert_eq!(navs.total, 1);
    assert_eq!(navs.updated, 1);

    let summary = app.get("/api/portfolio/summary", Some(&token)).await;
    assert_eq!(summary.body["summary"]["total_investment"], 9000.0);
    assert_eq!(summary.body["summary"]["current_value"], 1200.0 + 3000.0 + 5500.0);
}

#[tokio::test]
async fn jobs_with_nothing_to_do_report_zero() {
    let app = app();
    let context = app.state.job_context();

    let stocks = context.run(Job::StockPrices).await.expect("stock job");
    assert_eq!((stocks.total, stocks.updated), (0, 0));

    let navs = context.run(Job::MutualFundNav).await.expect("nav job");
    assert_eq!((navs.total, navs.updated, navs.skipped), (0, 0, 0));
}
