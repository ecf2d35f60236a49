//! Integration tests for OpenWeatherProvider using wiremock.

use weather_core::{Coordinates, FetchError, OpenWeatherProvider, UnitSystem, WeatherProvider};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn current_weather_body() -> serde_json::Value {
    serde_json::json!({
        "coord": {"lon": -0.1276, "lat": 51.5072},
        "weather": [
            {"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}
        ],
        "main": {
            "temp": 14.2, "feels_like": 13.5, "temp_min": 12.8, "temp_max": 15.6,
            "pressure": 1012, "humidity": 77
        },
        "wind": {"speed": 4.63, "deg": 240},
        "dt": 1700000000,
        "sys": {"country": "GB", "sunrise": 1699946000, "sunset": 1699979000},
        "name": "London",
        "cod": 200
    })
}

fn provider_for(server: &MockServer) -> OpenWeatherProvider {
    OpenWeatherProvider::new(format!("{}/data/2.5", server.uri()))
}

#[tokio::test]
async fn test_fetch_weather_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "51.5072"))
        .and(query_param("lon", "-0.1276"))
        .and(query_param("units", "metric"))
        .and(query_param("appid", "KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let weather = provider
        .fetch_weather(Coordinates::new(51.5072, -0.1276), UnitSystem::Metric, "KEY")
        .await
        .unwrap();

    assert_eq!(weather.name, "London");
    assert_eq!(weather.sys.country, "GB");
    assert_eq!(weather.weather[0].main, "Clouds");
    assert_eq!(weather.weather[0].icon, "04d");
    assert_eq!(weather.main.temp, 14.2);
    assert_eq!(weather.main.humidity, 77.0);
    assert_eq!(weather.wind.speed, 4.63);
    assert_eq!(weather.sys.sunset, 1699979000);
}

#[tokio::test]
async fn test_fetch_weather_imperial_units_param() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let result = provider
        .fetch_weather(Coordinates::new(30.27, -97.74), UnitSystem::Imperial, "KEY")
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_fetch_weather_bad_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"cod": "400", "message": "wrong latitude"})),
        )
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let err = provider
        .fetch_weather(Coordinates::new(999.0, 0.0), UnitSystem::Metric, "KEY")
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(400));
    assert!(err.is_bad_request());
    match err {
        FetchError::Status { body, .. } => assert!(body.contains("wrong latitude")),
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_weather_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let err = provider
        .fetch_weather(Coordinates::new(1.0, 2.0), UnitSystem::Metric, "WRONG")
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(401));
    assert!(!err.is_bad_request());
}

#[tokio::test]
async fn test_fetch_weather_malformed_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "Nowhere"})))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let err = provider
        .fetch_weather(Coordinates::new(1.0, 2.0), UnitSystem::Metric, "KEY")
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Decode(_)));
    assert_eq!(err.status_code(), None);
}

#[tokio::test]
async fn test_fetch_weather_connection_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let provider = OpenWeatherProvider::new(format!("http://127.0.0.1:{port}"));
    let err = provider
        .fetch_weather(Coordinates::new(1.0, 2.0), UnitSystem::Metric, "KEY")
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)));
    assert_eq!(err.status_code(), None);
}
