// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 端到端测试模块
///
/// 模拟真实运行场景，验证爬取、评分与变更检测的完整流程
pub mod helpers;
pub mod lead_pipeline_test;
