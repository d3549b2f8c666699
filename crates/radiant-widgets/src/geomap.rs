#![forbid(unsafe_code)]

//! Map viewport model.
//!
//! [`GeoMap`] keeps its view (center latitude, center longitude, zoom) in
//! persistent cells under its storage namespace, so the view survives
//! reloads. Keys: `viewCenterLat`, `viewCenterLon`, `viewZoom`.
//!
//! When nothing is stored yet, the center defaults to the position of the
//! first `PositionedDevice` block the index knows about (its `latitude` and
//! `longitude` number cells), else to `0, 0`. Zoom defaults to `1`, the whole
//! world.

use std::any::Any;
use std::fmt;

use radiant_core::{Block, Cell, CellError, Subscription, Value, ValueType};
use radiant_runtime::{Index, PersistentCell};
use tracing::debug;

use crate::element::Element;
use crate::error::Result;
use crate::widget::{Widget, WidgetConfig, WidgetKind};

pub const VIEW_CENTER_LAT_KEY: &str = "viewCenterLat";
pub const VIEW_CENTER_LON_KEY: &str = "viewCenterLon";
pub const VIEW_ZOOM_KEY: &str = "viewZoom";

/// Action dispatched to the coordinator once a map is constructed.
pub const REGISTER_MAP_ACTION: &str = "registerMap";

/// Capability of blocks whose position can center the map.
pub const POSITIONED_DEVICE: &str = "PositionedDevice";

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 1.0e6;

fn latitude_type() -> ValueType {
    ValueType::Range {
        min: -90.0,
        max: 90.0,
        integer: false,
    }
}

fn longitude_type() -> ValueType {
    ValueType::Range {
        min: -180.0,
        max: 180.0,
        integer: false,
    }
}

fn zoom_type() -> ValueType {
    ValueType::Range {
        min: MIN_ZOOM,
        max: MAX_ZOOM,
        integer: false,
    }
}

/// Longitude folded into `[-180, 180)`.
fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Position of the first reachable positioned device, if any.
#[must_use]
pub fn device_position(index: &Index) -> Option<(f64, f64)> {
    index
        .lookup_capability(POSITIONED_DEVICE)
        .iter()
        .find_map(|block| {
            let lat = block.get("latitude")?.get().as_number()?;
            let lon = block.get("longitude")?.get().as_number()?;
            (lat.is_finite() && lon.is_finite())
                .then(|| (lat.clamp(-90.0, 90.0), wrap_longitude(lon)))
        })
}

pub struct GeoMap {
    element: Element,
    center_lat: PersistentCell,
    center_lon: PersistentCell,
    zoom: PersistentCell,
    receivers: Element,
    _subscriptions: Vec<Subscription>,
}

impl fmt::Debug for GeoMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lat, lon) = self.center();
        f.debug_struct("GeoMap")
            .field("lat", &lat)
            .field("lon", &lon)
            .field("zoom", &self.zoom())
            .finish_non_exhaustive()
    }
}

fn number(cell: &Cell) -> f64 {
    cell.get().as_number().unwrap_or(0.0)
}

fn render_view(element: &Element, lat: &Cell, lon: &Cell, zoom: &Cell) {
    element.set_attribute("data-center-lat", lat.get().to_string());
    element.set_attribute("data-center-lon", lon.get().to_string());
    element.set_attribute("data-zoom", zoom.get().to_string());
}

fn render_receivers(list: &Element, receivers: &Value) {
    list.truncate_children(0);
    if let Some(block) = receivers.as_block() {
        for key in block.keys() {
            let item = Element::with_class("li", "geomap-receiver");
            item.set_text(key);
            list.append_child(item);
        }
    }
}

impl GeoMap {
    pub fn new(config: WidgetConfig) -> Result<Self> {
        let target: Block = config.target_block()?;
        let (default_lat, default_lon) = device_position(&config.index).unwrap_or((0.0, 0.0));

        let center_lat = PersistentCell::new(
            &config.scheduler,
            &config.storage,
            VIEW_CENTER_LAT_KEY,
            latitude_type(),
            default_lat,
        )?;
        let center_lon = PersistentCell::new(
            &config.scheduler,
            &config.storage,
            VIEW_CENTER_LON_KEY,
            longitude_type(),
            default_lon,
        )?;
        let zoom = PersistentCell::new(
            &config.scheduler,
            &config.storage,
            VIEW_ZOOM_KEY,
            zoom_type(),
            MIN_ZOOM,
        )?;

        let element = config.element.clone();
        element.add_class("widget-GeoMap");
        render_view(&element, center_lat.cell(), center_lon.cell(), zoom.cell());

        let mut subscriptions = Vec::with_capacity(4);
        for cell in [center_lat.cell(), center_lon.cell(), zoom.cell()] {
            let element = element.clone();
            let (lat, lon, z) = (
                center_lat.cell().clone(),
                center_lon.cell().clone(),
                zoom.cell().clone(),
            );
            subscriptions.push(cell.subscribe(&config.scheduler, move |_| {
                render_view(&element, &lat, &lon, &z);
            }));
        }

        let receivers = Element::with_class("ul", "geomap-receivers");
        element.append_child(receivers.clone());
        if let Some(receivers_cell) = target.get("receivers") {
            render_receivers(&receivers, &receivers_cell.get());
            let list = receivers.clone();
            subscriptions.push(receivers_cell.subscribe(&config.scheduler, move |value| {
                render_receivers(&list, value);
            }));
        }

        config
            .actions
            .dispatch(REGISTER_MAP_ACTION, &Value::Text(config.storage.prefix().to_owned()));
        debug!(
            storage = config.storage.prefix(),
            restored = center_lat.restored(),
            "geomap constructed"
        );

        Ok(Self {
            element,
            center_lat,
            center_lon,
            zoom,
            receivers,
            _subscriptions: subscriptions,
        })
    }

    /// `(latitude, longitude)` of the view center.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (number(self.center_lat.cell()), number(self.center_lon.cell()))
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        number(self.zoom.cell())
    }

    /// Keys of the target's `receivers` block as last rendered.
    #[must_use]
    pub fn receivers(&self) -> Vec<String> {
        self.receivers.children().iter().map(Element::text).collect()
    }

    /// Move the view. Latitude and zoom are clamped, longitude wraps.
    ///
    /// All three values are checked before any is written, so a rejected
    /// view (a NaN component) leaves the current view untouched.
    pub fn set_view(&self, lat: f64, lon: f64, zoom: f64) -> std::result::Result<(), CellError> {
        let updates = [
            (&self.center_lat, Value::Number(lat.clamp(-90.0, 90.0))),
            (&self.center_lon, Value::Number(wrap_longitude(lon))),
            (&self.zoom, Value::Number(zoom.clamp(MIN_ZOOM, MAX_ZOOM))),
        ];
        if let Some((cell, value)) = updates
            .iter()
            .find(|(cell, value)| !cell.cell().value_type().check(value))
        {
            return Err(CellError::type_mismatch(cell.cell().value_type(), value));
        }
        for (cell, value) in updates {
            cell.cell().set(value)?;
        }
        Ok(())
    }

    /// Shift the center by the given number of degrees.
    pub fn pan(&self, dlat: f64, dlon: f64) -> std::result::Result<(), CellError> {
        let (lat, lon) = self.center();
        self.set_view(lat + dlat, lon + dlon, self.zoom())
    }

    /// Multiply the zoom by `factor`.
    pub fn zoom_by(&self, factor: f64) -> std::result::Result<(), CellError> {
        let (lat, lon) = self.center();
        self.set_view(lat, lon, self.zoom() * factor)
    }
}

impl Widget for GeoMap {
    fn element(&self) -> &Element {
        &self.element
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::of::<Self>("GeoMap")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
