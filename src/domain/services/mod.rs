// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 该模块包含系统的核心业务逻辑服务，这些服务封装了线索发现的
/// 业务规则，协调多个领域对象来完成一次域名的爬取与评分。
///
/// 包含的服务：
/// - 变更检测（change_detector）：比较前后两次运行的画像与评分
/// - 爬取服务（crawl_service）：按域名调度 robots 检查、限流、抓取和提取
/// - 提取服务（extraction_service）：页面分类与信号提取
/// - 限流服务（rate_limiting_service）：按域名的请求间隔、每小时上限与退避
/// - 评分服务（scoring_service）：五项分量得分与优先级
pub mod change_detector;
pub mod crawl_service;
pub mod extraction_service;
pub mod rate_limiting_service;
pub mod scoring_service;
