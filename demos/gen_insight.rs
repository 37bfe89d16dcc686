//! Generate insight and dashboard output for a sample week

fn main() {
    let nights = r#"[
        { "id": "n1", "sleep_start": "2024-01-09T23:40:00+01:00", "duration_min": 355, "awakenings": 2, "sleep_efficiency": 0.86, "quality_num": 3 },
        { "id": "n2", "sleep_start": "2024-01-10T00:15:00+01:00", "duration_min": 340, "awakenings": 1, "sleep_efficiency": 0.88, "quality_num": 3 },
        { "id": "n3", "sleep_start": "2024-01-10T23:55:00+01:00", "duration_min": "372", "wakeups_count": 2, "sleep_efficiency": 84, "quality_num": 2 },
        { "id": "n4", "sleep_start": "2024-01-12T00:30:00+01:00", "duration_min": 330, "awakenings": 3, "sleep_efficiency": 0.83, "quality_num": 2 },
        { "id": "n5", "sleep_start": "2024-01-12T23:50:00+01:00", "duration_min": 365, "awakenings": 1, "sleep_efficiency": 0.9, "quality_num": 4 }
    ]"#;
    let request = r#"{ "days": 7, "primaryDriver": "deadline stress", "notes": "coffee after lunch" }"#;

    match rrsm_engine::nights_to_insights(nights.to_string(), request.to_string()) {
        Ok(response) => println!("{response}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }

    match rrsm_engine::nights_to_dashboard(nights.to_string(), None) {
        Ok(response) => println!("{response}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
