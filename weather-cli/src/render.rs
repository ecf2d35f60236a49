use weather_core::{DisplayModel, IconCategory, SessionEvent, SessionOutcome};

fn icon_glyph(icon: IconCategory) -> &'static str {
    match icon {
        IconCategory::Clear => "☀",
        IconCategory::Cloud => "☁",
        IconCategory::Rain => "🌧",
        IconCategory::Storm => "⛈",
        IconCategory::Snow => "❄",
    }
}

pub fn print_display(display: &DisplayModel) {
    println!("{}, {}", display.name, display.country);

    let glyph = display.icon.map(icon_glyph).unwrap_or(" ");
    match (&display.main, &display.description) {
        (Some(main), Some(description)) => println!("{glyph} {main} ({description})"),
        (Some(main), None) => println!("{glyph} {main}"),
        _ => {}
    }

    println!("  Temperature  {}", display.temperature);
    println!("  Range        {} / {}", display.temp_min, display.temp_max);
    println!("  Humidity     {}", display.humidity);
    println!("  Wind         {}", display.wind_speed);
    println!("  Sunrise      {}", display.sunrise);
    println!("  Sunset       {}", display.sunset);
}

pub fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Display(display) => {
            print_display(display);
            println!();
        }
        SessionEvent::FetchFailed(err) => eprintln!("Weather update failed: {err}"),
        SessionEvent::Offline => eprintln!("No network connection; showing last known weather."),
        SessionEvent::Notice(message) => eprintln!("{message}"),
        SessionEvent::StateChanged(state) => tracing::trace!(%state, "state changed"),
    }
}

pub fn print_outcome(outcome: SessionOutcome) {
    match outcome {
        SessionOutcome::Ended | SessionOutcome::LocationServicesDisabled => {}
        SessionOutcome::PermissionDenied => {
            eprintln!("Location access was not granted.");
        }
        SessionOutcome::Blocked => {
            eprintln!("Location access is turned off. Run `weather permissions grant` to enable it.");
        }
        SessionOutcome::RedirectedToSettings => {}
    }
}

pub fn print_no_cache() {
    println!("No weather cached yet. Run `weather now` to fetch it.");
}
