//! Tour routes: CRUD, preset and aggregate reads, geo queries, images,
//! and reviews nested under a tour

use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Datelike;
use serde_json::{json, Value};

use crate::auth::{protect, require_role, CurrentUser};
use crate::domain::{tour_scope, CreateReview, Review, Role, Tour};
use crate::error::{Error, Result};
use crate::handlers::{
    create_one, delete_one, get_all, get_one, list_documents, parse_id, update_one, Created,
    Envelope,
};
use crate::query::QueryOptions;
use crate::repository::{to_outbound_document, Entity};
use crate::state::AppState;
use crate::store::Document;
use crate::uploads::{ensure_supported, image_filename, TOUR_IMAGES};

const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_MILE: f64 = 1.609_344;

pub fn router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/top-5-cheap", get(top_cheap_tours))
        .route("/stats", get(tour_stats))
        .route("/monthly-plan/{year}", get(monthly_plan))
        .route("/within/{dist}/center/{latlng}/unit/{unit}", get(tours_within))
        .route("/distances/{latlng}/unit/{unit}", get(tour_distances))
        .route("/", get(get_all::<Tour>))
        .route("/{tour_id}", get(get_one::<Tour>));

    let guides_only = Router::new()
        .route("/", post(create_one::<Tour>))
        .route(
            "/{tour_id}",
            axum::routing::patch(update_one::<Tour>).delete(delete_one::<Tour>),
        )
        .route("/{tour_id}/images", post(upload_images))
        .route_layer(middleware::from_fn(|req: axum::extract::Request, next: axum::middleware::Next| {
            require_role(&[Role::Admin, Role::LeadGuide], req, next)
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), protect));

    public
        .merge(guides_only)
        .nest("/{tour_id}/reviews", nested_reviews(state))
}

fn nested_reviews(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_tour_reviews).post(create_tour_review))
        .route_layer(middleware::from_fn(|req: axum::extract::Request, next: axum::middleware::Next| {
            require_role(&[Role::User, Role::Admin], req, next)
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), protect))
}

/// Preset list: the five best-rated tours, cheapest first among equals.
/// Client-supplied query parameters are ignored, as a preset should.
async fn top_cheap_tours(State(state): State<AppState>) -> Result<Json<Envelope<Vec<Document>>>> {
    let options = QueryOptions::from_pairs(vec![
        ("limit".to_string(), "5".to_string()),
        ("sort".to_string(), "-ratings_average,price".to_string()),
    ]);
    let envelope = list_documents(state.tours(), options, Vec::new()).await?;
    Ok(Json(envelope))
}

/// Per-difficulty aggregate over well-rated tours
async fn tour_stats(State(state): State<AppState>) -> Result<Json<Envelope<Vec<Value>>>> {
    struct Bucket {
        num_tours: u64,
        num_ratings: u64,
        rating_sum: f64,
        price_sum: f64,
        min_price: f64,
        max_price: f64,
    }

    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();
    for tour in state.tours().all().await? {
        if tour.ratings_average < 4.5 {
            continue;
        }
        let key = tour.difficulty.to_string().to_uppercase();
        let bucket = buckets.entry(key).or_insert(Bucket {
            num_tours: 0,
            num_ratings: 0,
            rating_sum: 0.0,
            price_sum: 0.0,
            min_price: f64::INFINITY,
            max_price: f64::NEG_INFINITY,
        });
        bucket.num_tours += 1;
        bucket.num_ratings += tour.ratings_quantity;
        bucket.rating_sum += tour.ratings_average;
        bucket.price_sum += tour.price;
        bucket.min_price = bucket.min_price.min(tour.price);
        bucket.max_price = bucket.max_price.max(tour.price);
    }

    let stats: Vec<Value> = buckets
        .into_iter()
        .map(|(difficulty, b)| {
            json!({
                "difficulty": difficulty,
                "num_tours": b.num_tours,
                "num_ratings": b.num_ratings,
                "avg_rating": b.rating_sum / b.num_tours as f64,
                "avg_price": b.price_sum / b.num_tours as f64,
                "min_price": b.min_price,
                "max_price": b.max_price,
            })
        })
        .collect();
    Ok(Json(Envelope::collection(stats)))
}

/// How many tours start in each month of a year, busiest month first
async fn monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Json<Envelope<Vec<Value>>>> {
    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for tour in state.tours().all().await? {
        for start in &tour.start_dates {
            if start.year() == year {
                months.entry(start.month()).or_default().push(tour.name.clone());
            }
        }
    }

    let mut plan: Vec<(u32, Vec<String>)> = months.into_iter().collect();
    plan.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));
    let plan: Vec<Value> = plan
        .into_iter()
        .take(12)
        .map(|(month, tours)| {
            json!({
                "month": month,
                "num_tour_starts": tours.len(),
                "tours": tours,
            })
        })
        .collect();
    Ok(Json(Envelope::collection(plan)))
}

/// Tours whose start location falls inside a circle around the center
async fn tours_within(
    State(state): State<AppState>,
    Path((dist, latlng, unit)): Path<(String, String, String)>,
) -> Result<Json<Envelope<Vec<Document>>>> {
    let (lat, lng) = parse_latlng(&latlng)?;
    let radius_km = parse_distance_km(&dist, &unit)?;

    let mut found = Vec::new();
    for tour in state.tours().all().await? {
        let Some(start) = &tour.start_location else {
            continue;
        };
        if haversine_km(lat, lng, start.latitude(), start.longitude()) <= radius_km {
            found.push(to_outbound_document(&tour)?);
        }
    }
    Ok(Json(Envelope::collection(found)))
}

/// Distance from the center to every tour's start location, nearest first
async fn tour_distances(
    State(state): State<AppState>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<Json<Envelope<Vec<Value>>>> {
    let (lat, lng) = parse_latlng(&latlng)?;
    let per_km = match unit.as_str() {
        "kilometer" => 1.0,
        "miles" => 1.0 / KM_PER_MILE,
        _ => {
            return Err(Error::BadRequest(
                "Distance must be in kilometer or miles".to_string(),
            ))
        }
    };

    let mut distances = Vec::new();
    for tour in state.tours().all().await? {
        let Some(start) = &tour.start_location else {
            continue;
        };
        let km = haversine_km(lat, lng, start.latitude(), start.longitude());
        distances.push((
            km,
            json!({
                "name": tour.name,
                "distance": km * per_km,
            }),
        ));
    }
    distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(Json(Envelope::collection(
        distances.into_iter().map(|(_, v)| v).collect(),
    )))
}

/// Reviews scoped to the tour in the path
async fn list_tour_reviews(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Envelope<Vec<Document>>>> {
    let tour_id = parse_id(&tour_id)?;
    let envelope = list_documents(
        state.reviews(),
        QueryOptions::from_pairs(pairs),
        vec![tour_scope(&tour_id)],
    )
    .await?;
    Ok(Json(envelope))
}

/// Create a review under a tour; tour and author default from context
async fn create_tour_review(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(mut payload): Json<CreateReview>,
) -> Result<Created<Document>> {
    let tour_id = parse_id(&tour_id)?;
    payload.tour.get_or_insert(tour_id);
    payload.user.get_or_insert(user.id);

    let review = state.reviews().create(Review::from_create(payload)).await?;
    Ok(Created(Envelope::item(Some(to_outbound_document(&review)?))))
}

/// Accept a cover image and up to three gallery images, store them, and
/// point the tour at the new filenames.
async fn upload_images(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<Document>>> {
    let tour_id = parse_id(&tour_id)?;
    let max_bytes = state.config().uploads.max_image_bytes;

    let mut patch = Document::new();
    let mut gallery: Vec<String> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name != "image_cover" && name != "images" {
            continue;
        }
        ensure_supported(field.content_type())?;
        let original = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::BadRequest(format!("malformed upload: {e}")))?;
        if bytes.len() > max_bytes {
            return Err(Error::BadRequest("Image too large".to_string()));
        }

        let filename = if name == "image_cover" {
            image_filename(&format!("tour-{tour_id}"), original.as_deref(), Some("cover"))
        } else {
            if gallery.len() >= 3 {
                return Err(Error::BadRequest(
                    "At most three gallery images are allowed".to_string(),
                ));
            }
            image_filename(
                &format!("tour-{tour_id}"),
                original.as_deref(),
                Some(&format!("{}", gallery.len() + 1)),
            )
        };
        state.images().store(TOUR_IMAGES, &filename, &bytes).await?;

        if name == "image_cover" {
            patch.insert("image_cover".to_string(), Value::String(filename));
        } else {
            gallery.push(filename);
        }
    }
    if !gallery.is_empty() {
        patch.insert("images".to_string(), json!(gallery));
    }
    if patch.is_empty() {
        return Err(Error::BadRequest("No images provided".to_string()));
    }

    let tour = state
        .tours()
        .update(&tour_id, patch)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No Tour found with id {tour_id}")))?;
    Ok(Json(Envelope::item(Some(to_outbound_document(&tour)?))))
}

fn parse_latlng(raw: &str) -> Result<(f64, f64)> {
    let Some((lat, lng)) = raw.split_once(',') else {
        return Err(Error::BadRequest(
            "Please provide latlng in the format lat,lng".to_string(),
        ));
    };
    let (Ok(lat), Ok(lng)) = (lat.trim().parse::<f64>(), lng.trim().parse::<f64>()) else {
        return Err(Error::BadRequest(
            "Latitude and longitude must be valid numbers".to_string(),
        ));
    };
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(Error::BadRequest(
            "Invalid latitude or longitude values".to_string(),
        ));
    }
    Ok((lat, lng))
}

fn parse_distance_km(raw: &str, unit: &str) -> Result<f64> {
    let dist: f64 = raw
        .parse()
        .map_err(|_| Error::BadRequest("Distance must be a valid number".to_string()))?;
    if dist <= 0.0 {
        return Err(Error::BadRequest(
            "Distance must be a positive number".to_string(),
        ));
    }
    match unit {
        "kilometer" => Ok(dist),
        "miles" => Ok(dist * KM_PER_MILE),
        _ => Err(Error::BadRequest(
            "Distance must be in kilometer or miles".to_string(),
        )),
    }
}

fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlng_parsing() {
        assert_eq!(parse_latlng("40.7,-74.0").unwrap(), (40.7, -74.0));
        assert!(parse_latlng("40.7").is_err());
        assert!(parse_latlng("abc,def").is_err());
        assert!(parse_latlng("91,0").is_err());
        assert!(parse_latlng("0,181").is_err());
    }

    #[test]
    fn distance_units() {
        assert_eq!(parse_distance_km("10", "kilometer").unwrap(), 10.0);
        let miles = parse_distance_km("10", "miles").unwrap();
        assert!((miles - 16.09344).abs() < 1e-9);
        assert!(parse_distance_km("10", "furlongs").is_err());
        assert!(parse_distance_km("-1", "kilometer").is_err());
        assert!(parse_distance_km("x", "kilometer").is_err());
    }

    #[test]
    fn haversine_known_distance() {
        // Paris to London is roughly 344 km
        let km = haversine_km(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((km - 344.0).abs() < 5.0, "got {km}");
        // A point is at zero distance from itself
        assert!(haversine_km(10.0, 20.0, 10.0, 20.0) < 1e-9);
    }
}
