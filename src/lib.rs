//! page-capture: Capture a paged desktop reader into images and a PDF
//!
//! This library drives a desktop e-book reader page by page: it locates the
//! reader window, captures and crops the current page, stores it as the next
//! numbered image, clicks the reader's next-page button (positioned relative
//! to the window), and repeats. Runs can be paused, stopped, and resumed; the
//! captured pages are finally assembled into a single PDF.
//!
//! The platform pieces (window capture, click simulation, hotkeys) live
//! behind the [`capture::CaptureFacade`] and [`capture::InputDriver`] traits;
//! the `desktop` feature provides real implementations.

pub mod assemble;
pub mod calibration;
pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod hotkeys;
pub mod model;
pub mod pages;
pub mod progress;
pub mod session;
pub mod util;
