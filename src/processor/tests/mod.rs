//! Integration tests for the processor module
//!
//! Tests the complete batch pipeline over temporary telemetry files.

pub mod error_handling;
pub mod multi_stream;

/// One complete summary frame for system 3 at 2017-05-01 12:00
pub const SUMMARY_FRAME: &str = "NORM A1B2 512 2017/05/01 12:10:00 STN07 3 2.1_01/01/2015
05/01/2017 12:00:05 4710.1234 N 12225.6789 W 42 1 2017/05/01_12:00:03 2017/05/01_12:00:07 0
13.2 12.9 0.987 1.013 0000 28.51 0.02 5.12 0.01 35.1 0.03 -12.5 3.1 8.2 2.9 181 175 7.4
1.5 35.1 0.1 101.3 0.2 398.7 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4
2.5 35.1 0.1 101.3 0.2 0.3 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4
3.5 35.1 0.1 101.3 0.2 0.2 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4
4.5 35.1 0.1 101.3 0.2 501.0 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4
5.5 35.1 0.1 101.3 0.2 500.2 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4
6.5 35.1 0.1 101.3 0.2 500.1 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4
7.5 35.1 0.1 101.3 0.2 398.7 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4
8.5 35.1 0.1 101.3 0.2 398.1 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4
9.5 35.1 0.1 101.3 0.2 401.2 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4
10.5 35.1 0.1 101.3 0.2 -999.0 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4
";
