//! Fixed prompt templates for the summary and the video

use crate::models::{DailyForecast, Place, Summary};

/// How much of the summary goes into the video prompt
pub const VIDEO_SUMMARY_CHARS: usize = 200;

/// System instruction for the weather-summarization model
#[must_use]
pub fn summary_system_instruction(place: &Place) -> String {
    format!(
        r#"You are a weather summarization assistant for the application "WeatherForecastee".
Your task is to interpret a 7-day weather forecast from the Open-Meteo API and produce a concise, human-readable text summary that highlights temperature trends, precipitation, wind, and other key weather indicators. The summary should resemble short daily notes with natural language and local context.
### Input
- Location: {name}, {country}
- Forecast source: Open-Meteo API (7-day data)
- Units: °C, mm, km/h
The data will include:
- Temperature (max, min)
- Precipitation (mm) and precipitation probability
- Snowfall (cm)
- Wind speed and gusts (km/h)
- Weather code
- Time zone localized values
### Output format
Generate natural language outputs following this structure:
Day 1: {{weekday}} {{month}} {{day}}
- {{Short summary: e.g., Cool day with scattered showers, light morning frost.}}
- {{Key details: high X°C, low Y°C, precip Z mm (rain or snow type), gusts W km/h, conditions summary}}.
Repeat for Day 2 and Day 3.
Days 4-7 Summary:
- Summarize temperature range (e.g., highs 3–7°C)
- Mention precipitation trends (mm of rain/snow)
- Highlight important wind alerts
- End with an overall trend (e.g., colder midweek, improving by weekend)
### Style and tone
- Professional but friendly and readable.
- Write short, complete sentences.
- Emphasize weather impact (travel risk, frost, snow, visibility).
- Avoid unnecessary repetition or numeric overload.
- Always use local timezone wording (e.g., "evening frost," "midday snow")."#,
        name = place.name,
        country = place.country,
    )
}

/// User instruction embedding the serialized forecast
pub fn summary_user_prompt(place: &Place, forecast: &DailyForecast) -> serde_json::Result<String> {
    let data = serde_json::to_string_pretty(forecast)?;
    Ok(format!(
        "Using the provided Open-Meteo forecast data JSON, generate the 7-day forecast summary for {}, {}.\n\nForecast Data:\n{}",
        place.name, place.country, data
    ))
}

/// Cinematic prompt for the reporter video
#[must_use]
pub fn reporter_video_prompt(place_name: &str, summary: &Summary) -> String {
    format!(
        "Professional TV reporter in modern studio delivers 7-day forecast for {}: {}..., cinematic, clear audio narration, 8-second clip",
        place_name,
        summary.prefix(VIDEO_SUMMARY_CHARS)
    )
}
