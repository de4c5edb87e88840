use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

use expense_tracker_cli::client::{ClientMode, ExpenseClient};
use expense_tracker_cli::filter::FilterCriteria;
use expense_tracker_cli::types::{Period, UserId};
use rust_decimal::Decimal;

/// Answers a single request and hands the request head back to the test.
fn serve_one(status: u16, body: &'static str) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();

        let mut buf = Vec::new();
        let mut header_end = None;
        while header_end.is_none() {
            let mut tmp = [0u8; 1024];
            let n = stream.read(&mut tmp).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(i) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                header_end = Some(i + 4);
            }
        }

        let header_end = header_end.expect("did not receive full headers");
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
        tx.send(headers).unwrap();

        let resp = format!(
            "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(resp.as_bytes()).unwrap();
    });

    (format!("http://{}", addr), rx)
}

fn client(base_url: String, token: Option<&str>) -> ExpenseClient {
    ExpenseClient::new(ClientMode::Http {
        base_url,
        token: token.map(str::to_string),
    })
}

fn request_line(headers: &str) -> &str {
    headers.lines().next().unwrap_or_default()
}

#[test]
fn categories_are_fetched_with_bearer_token() {
    let (base_url, rx) = serve_one(
        200,
        r#"[{"id":1,"name":"Food","parent":null},{"id":2,"name":"Groceries","parent":{"id":1}}]"#,
    );
    let items = client(base_url, Some("abc")).list_categories().unwrap();

    let headers = rx.recv().unwrap();
    assert!(request_line(&headers).starts_with("GET /api/categories "));
    assert!(headers.to_lowercase().contains("authorization: bearer abc"));
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].parent_id.as_ref().map(|p| p.as_str()), Some("1"));
}

#[test]
fn only_constrained_filters_are_sent() {
    let (base_url, rx) = serve_one(200, "[]");
    let criteria = FilterCriteria {
        name: "coffee".to_string(),
        min_amount: Some(Decimal::new(500, 2)),
        ..Default::default()
    };
    let items = client(base_url, None)
        .list_transactions(&UserId::from("7"), &criteria)
        .unwrap();

    let headers = rx.recv().unwrap();
    let line = request_line(&headers);
    assert!(line.starts_with("GET /api/expenses/by-user/7?"), "{line}");
    assert!(line.contains("name=coffee"));
    assert!(line.contains("minAmount=5"));
    assert!(!line.contains("maxAmount"));
    assert!(!line.contains("categoryId"));
    assert!(!headers.to_lowercase().contains("authorization"));
    assert!(items.is_empty());
}

#[test]
fn report_is_requested_for_month_and_year() {
    let (base_url, rx) = serve_one(
        200,
        r#"{"totalExpenses":200,"categoryTotals":{"Food":120,"Rent":80},"topCategory":"Food","remainingBudget":null}"#,
    );
    let report = client(base_url, None)
        .monthly_report(&UserId::from("7"), Period::new(9, 2025).unwrap())
        .unwrap();

    let headers = rx.recv().unwrap();
    assert!(request_line(&headers).starts_with("GET /api/reports/7?month=9&year=2025 "));
    assert_eq!(report.buckets().len(), 2);
    assert_eq!(report.top_category.as_deref(), Some("Food"));
    assert_eq!(report.remaining_budget, None);
}

#[test]
fn month_detail_uses_the_by_category_endpoint() {
    let (base_url, rx) = serve_one(
        200,
        r#"[{"id":1,"name":"Lunch","amount":12.5,"date":"2025-09-02","categoryName":"Food"}]"#,
    );
    let items = client(base_url, None)
        .transactions_for_month(&UserId::from("7"), Period::new(9, 2025).unwrap())
        .unwrap();

    let headers = rx.recv().unwrap();
    assert!(
        request_line(&headers).starts_with("GET /api/expenses/by-user/7/by-category?month=9&year=2025 ")
    );
    assert_eq!(items[0].category_label(), "Food");
}

#[test]
fn budget_status_sends_the_period_only_when_given() {
    let body = r#"{"id":3,"userId":7,"totalBudget":500.0,"totalExpenses":460.0,"remainingBudget":40.0,"nearLimit":true,"alertThreshold":50.0}"#;

    let (base_url, rx) = serve_one(200, body);
    let status = client(base_url, None)
        .budget_status(&UserId::from("7"), Some(Period::new(8, 2025).unwrap()))
        .unwrap();
    let headers = rx.recv().unwrap();
    assert!(request_line(&headers).starts_with("GET /api/budget/status/7?month=8&year=2025 "));
    assert!(status.near_limit);
    assert_eq!(status.remaining_budget, Decimal::new(40, 0));

    let (base_url, rx) = serve_one(200, body);
    client(base_url, None)
        .budget_status(&UserId::from("7"), None)
        .unwrap();
    let headers = rx.recv().unwrap();
    assert!(request_line(&headers).starts_with("GET /api/budget/status/7 "));
}

#[test]
fn category_budgets_are_listed_per_user() {
    let (base_url, rx) = serve_one(
        200,
        r#"[{"id":1,"userId":7,"categoryId":4,"amount":800.0}]"#,
    );
    let budgets = client(base_url, None)
        .category_budgets(&UserId::from("7"))
        .unwrap();

    let headers = rx.recv().unwrap();
    assert!(request_line(&headers).starts_with("GET /api/category-budgets/by-user/7 "));
    assert_eq!(budgets.len(), 1);
    assert_eq!(budgets[0].category_id.as_str(), "4");
    assert_eq!(budgets[0].amount, Decimal::new(800, 0));
}

#[test]
fn unauthorized_is_reported_as_unauthenticated() {
    let (base_url, _rx) = serve_one(401, r#"{"message":"Unauthorized"}"#);
    let err = client(base_url, Some("expired"))
        .list_categories()
        .unwrap_err()
        .to_string();
    assert!(err.contains("unauthenticated"), "{err}");
}

#[test]
fn server_error_message_is_surfaced() {
    let (base_url, _rx) = serve_one(400, r#"{"message":"User not found"}"#);
    let err = client(base_url, None)
        .monthly_report(&UserId::from("404"), Period::new(1, 2025).unwrap())
        .unwrap_err()
        .to_string();
    assert_eq!(err, "api error 400: User not found");
}
