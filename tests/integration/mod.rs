// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 集成测试
//!
//! 通过本地 HTTP 服务验证真实抓取引擎与 robots 缓存的协作

pub mod robots_http_test;
pub mod pipeline_http_test;
