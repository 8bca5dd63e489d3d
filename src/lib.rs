//! Timetrack - employee time tracking and payroll estimation
//!
//! This library provides the storage, services and web layer used by the
//! `timetrack` server and the `timetrack-admin` tool.

pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod services;
pub mod views;
pub mod web;
